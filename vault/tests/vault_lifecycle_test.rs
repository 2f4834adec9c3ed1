//! Integration tests for the vault lifecycle.
//!
//! These tests drive a vault through deposits, debt intake, settlement and
//! redemption with exact 18-decimal amounts, checking both buckets, the
//! watermarks and every account's underlying balance along the way.

use alloy_primitives::{utils::parse_ether, Address, U256};
use bridgepool_vault::{
    AssetId, Bank, DebtPosting, MemoryBank, Role, SettlementPayload, Vault, VaultConfig, VaultError,
    VaultEvent,
};

const OWNER: Address = Address::repeat_byte(0x01);
const RELAYER: Address = Address::repeat_byte(0x02);
const USER1: Address = Address::repeat_byte(0x03);
const USER2: Address = Address::repeat_byte(0x04);
const RANDOM: Address = Address::repeat_byte(0x05);
const WETH: Address = Address::repeat_byte(0xee);

/// Helper: parses a decimal ether amount.
fn eth(amount: &str) -> U256 {
    parse_ether(amount).unwrap()
}

/// Helper: a WETH-backed vault with funded users and a funded L1 bridge.
fn weth_vault() -> Vault<MemoryBank> {
    let config = VaultConfig {
        share_name: "usdc bridge".into(),
        share_symbol: "usdc_b".into(),
        ..VaultConfig::devnet(AssetId::Token(WETH))
    };
    let asset = config.asset;
    let bridge = config.l1_bridge;

    let mut bank = MemoryBank::new();
    bank.mint(asset, USER1, eth("100")).unwrap();
    bank.mint(asset, USER2, eth("100")).unwrap();
    bank.mint(asset, bridge, eth("300")).unwrap();

    let mut vault = Vault::new(config, OWNER, bank).unwrap();
    vault.grant_role(OWNER, Role::Process, RELAYER).unwrap();
    vault.grant_role(OWNER, Role::Lp, USER1).unwrap();
    vault.grant_role(OWNER, Role::Lp, USER2).unwrap();
    vault
}

fn posting(recipient: Address, amount: &str, nonce: u64, l2_block: u64) -> DebtPosting {
    DebtPosting {
        recipient,
        amount: eth(amount),
        nonce,
        l2_block,
    }
}

fn payload(nonce: u64, principal: &str, fees: &str) -> SettlementPayload {
    SettlementPayload {
        nonce,
        amount_underlying: eth(principal),
        amount_lp_fees: eth(fees),
    }
}

fn weth_of(vault: &Vault<MemoryBank>, holder: Address) -> U256 {
    vault.bank().balance_of(AssetId::Token(WETH), holder)
}

fn assert_buckets(vault: &Vault<MemoryBank>, liquid: &str, pending: &str) {
    assert_eq!(vault.liquid_balance(), eth(liquid), "liquid balance");
    assert_eq!(vault.pending_debt(), eth(pending), "pending debt");
    assert_eq!(vault.total_assets(), eth(liquid) + eth(pending), "total assets");
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn construction_exposes_peers_and_metadata() {
    let vault = weth_vault();
    assert_eq!(vault.asset(), AssetId::Token(WETH));
    assert_eq!(vault.l1_bridge(), Address::repeat_byte(0xb1));
    assert_eq!(vault.starknet_core(), Address::repeat_byte(0xc0));
    assert_eq!(vault.l2_fw(), None);
    assert_eq!(vault.share_symbol(), "usdc_b");
    assert_eq!(vault.decimals(), 18);
    assert_eq!(vault.last_settled_nonce(), 0);
    assert!(!vault.paused());
    for role in Role::ALL {
        assert!(vault.has_role(role, OWNER));
    }
}

// ---------------------------------------------------------------------------
// Share trading
// ---------------------------------------------------------------------------

#[test]
fn bootstrap_deposit_is_one_to_one() {
    let mut vault = weth_vault();
    let shares = vault.deposit(USER1, eth("50"), USER1).unwrap();

    assert_eq!(shares, eth("50"));
    assert_buckets(&vault, "50", "0");
    assert_eq!(vault.total_shares(), eth("50"));
    assert_eq!(weth_of(&vault, USER1), eth("50"));
    assert_eq!(weth_of(&vault, vault.address()), eth("50"));
}

#[test]
fn bootstrap_mint_is_one_to_one() {
    let mut vault = weth_vault();
    let assets = vault.mint(USER1, eth("50"), USER1).unwrap();
    assert_eq!(assets, eth("50"));
    assert_buckets(&vault, "50", "0");
}

#[test]
fn withdraw_and_redeem_empty_the_liquid_bucket() {
    let mut vault = weth_vault();
    vault.deposit(USER1, eth("50"), USER1).unwrap();
    vault.withdraw(USER1, eth("50"), USER1, USER1).unwrap();
    assert_buckets(&vault, "0", "0");
    assert_eq!(vault.total_shares(), U256::ZERO);

    vault.deposit(USER1, eth("50"), USER1).unwrap();
    vault.redeem(USER1, eth("50"), USER1, USER1).unwrap();
    assert_buckets(&vault, "0", "0");
    assert_eq!(weth_of(&vault, USER1), eth("100"));
}

#[test]
fn deposit_then_redeem_never_returns_more() {
    let mut vault = weth_vault();
    vault.deposit(USER1, eth("7"), USER1).unwrap();
    vault
        .handle_bridge_users(RELAYER, &[posting(RANDOM, "3", 0, 1)])
        .unwrap();
    vault.execute_batch(RELAYER, &payload(0, "3", "0.3")).unwrap();

    let deposited = eth("1.234567890123456789");
    let shares = vault.deposit(USER2, deposited, USER2).unwrap();
    let returned = vault.redeem(USER2, shares, USER2, USER2).unwrap();
    assert!(returned <= deposited);
}

// ---------------------------------------------------------------------------
// Debt intake & settlement
// ---------------------------------------------------------------------------

#[test]
fn debts_move_liquidity_to_pending_and_pay_recipients() {
    let mut vault = weth_vault();
    vault.deposit(USER1, eth("50"), USER1).unwrap();

    let total = vault
        .handle_bridge_users(
            RELAYER,
            &[posting(USER1, "25", 1, 1), posting(USER2, "25", 2, 2)],
        )
        .unwrap();

    assert_eq!(total, eth("50"));
    assert_buckets(&vault, "0", "50");
    assert_eq!(vault.last_processed_block(), 2);
    assert_eq!(weth_of(&vault, USER1), eth("75"));
    assert_eq!(weth_of(&vault, USER2), eth("125"));
    assert!(matches!(
        vault.events().last(),
        Some(VaultEvent::BridgeUsersHandled { postings, .. }) if postings.len() == 2
    ));
}

#[test]
fn settlement_grows_share_price_and_redeem_loses_one_unit() {
    let mut vault = weth_vault();
    vault.deposit(USER1, eth("50"), USER1).unwrap();
    vault
        .handle_bridge_users(
            RELAYER,
            &[posting(USER1, "25", 0, 1), posting(USER2, "25", 1, 2)],
        )
        .unwrap();

    let pulled = vault.execute_batch(RELAYER, &payload(0, "50", "0.5")).unwrap();
    assert_eq!(pulled, eth("50.5"));
    assert_buckets(&vault, "50.5", "0");
    assert_eq!(vault.last_processed_block(), 2);
    assert_eq!(vault.last_settled_nonce(), 1);
    assert_eq!(weth_of(&vault, vault.l1_bridge()), eth("249.5"));

    vault.redeem(USER1, eth("50"), USER1, USER1).unwrap();
    assert_eq!(weth_of(&vault, USER1), eth("125.499999999999999999"));
}

#[test]
fn stale_block_is_rejected_without_side_effects() {
    let mut vault = weth_vault();
    vault.deposit(USER1, eth("100"), USER1).unwrap();
    vault
        .handle_bridge_users(RELAYER, &[posting(USER1, "25", 1, 2)])
        .unwrap();
    let before = vault.clone();

    let err = vault
        .handle_bridge_users(RELAYER, &[posting(USER2, "25", 2, 1)])
        .unwrap_err();

    assert_eq!(
        err,
        VaultError::BlockAlreadyProcessed {
            l2_block: 1,
            watermark: 2
        }
    );
    assert_eq!(vault, before);
}

#[test]
fn out_of_sequence_batch_is_rejected() {
    let mut vault = weth_vault();
    let before = vault.clone();
    let err = vault
        .execute_batch(OWNER, &payload(123, "1.0", "0.01"))
        .unwrap_err();
    assert_eq!(
        err,
        VaultError::InvalidBatchNonce {
            expected: 0,
            received: 123
        }
    );
    assert_eq!(vault, before);
}

#[test]
fn unaccounted_balance_does_not_back_postings() {
    let mut vault = weth_vault();
    let address = vault.address();
    vault
        .bank_mut()
        .transfer(AssetId::Token(WETH), USER1, address, eth("15"))
        .unwrap();

    let err = vault
        .handle_bridge_users(RELAYER, &[posting(USER1, "1", 1, 1)])
        .unwrap_err();
    assert_eq!(
        err,
        VaultError::InsufficientUnderlying {
            requested: eth("1"),
            available: U256::ZERO
        }
    );
}

#[test]
fn postings_with_zero_fields_are_rejected() {
    let mut vault = weth_vault();
    let err = vault
        .handle_bridge_users(OWNER, &[posting(Address::ZERO, "15", 0, 1)])
        .unwrap_err();
    assert_eq!(err, VaultError::AddressNul);

    let err = vault
        .handle_bridge_users_manually(OWNER, &[posting(RANDOM, "0", 0, 1)])
        .unwrap_err();
    assert_eq!(err, VaultError::AmountNul);
}

#[test]
fn empty_intake_only_logs_an_event() {
    let mut vault = weth_vault();
    vault.drain_events();
    let state = *vault.state();

    assert_eq!(vault.handle_bridge_users(RELAYER, &[]).unwrap(), U256::ZERO);
    assert_eq!(*vault.state(), state);
    assert_eq!(vault.events().len(), 1);
}

#[test]
fn many_phases_two_lps_two_intakes_three_batches() {
    let mut vault = weth_vault();
    vault.deposit(USER1, eth("50"), USER1).unwrap();
    vault.deposit(USER2, eth("50"), USER2).unwrap();

    vault
        .handle_bridge_users(
            RELAYER,
            &[posting(RANDOM, "80", 0, 1), posting(RANDOM, "20", 1, 2)],
        )
        .unwrap();
    assert_buckets(&vault, "0", "100");
    assert_eq!(vault.last_processed_block(), 2);

    vault.execute_batch(RELAYER, &payload(0, "50", "0.5")).unwrap();
    assert_buckets(&vault, "50.5", "50");

    vault.redeem(USER1, eth("50"), USER1, USER1).unwrap();
    assert_eq!(weth_of(&vault, USER1), eth("100.249999999999999999"));
    assert_buckets(&vault, "0.250000000000000001", "50");

    let before = vault.clone();
    let err = vault.redeem(USER2, eth("1"), USER2, USER2).unwrap_err();
    assert_eq!(err.kind(), "TransferFailed");
    assert_eq!(vault, before);

    vault.execute_batch(RELAYER, &payload(1, "20", "0.2")).unwrap();
    assert_buckets(&vault, "20.450000000000000001", "30");
    assert_eq!(weth_of(&vault, USER2), eth("50"));

    vault.withdraw(USER2, eth("10"), USER2, USER2).unwrap();
    assert_eq!(weth_of(&vault, USER2), eth("60"));
    assert_buckets(&vault, "10.450000000000000001", "30");

    vault
        .handle_bridge_users(RELAYER, &[posting(RANDOM, "10.450000000000000001", 3, 3)])
        .unwrap();
    assert_buckets(&vault, "0", "40.450000000000000001");
    assert_eq!(vault.last_processed_block(), 3);

    vault.deposit(USER1, eth("50"), USER1).unwrap();
    assert_buckets(&vault, "50", "40.450000000000000001");

    vault
        .execute_batch(RELAYER, &payload(2, "40.450000000000000001", "0.4045"))
        .unwrap();
    assert_buckets(&vault, "90.854500000000000001", "0");
    assert_eq!(vault.last_settled_nonce(), 3);
    assert_eq!(weth_of(&vault, RANDOM), eth("110.450000000000000001"));
}

// ---------------------------------------------------------------------------
// Native-value vault
// ---------------------------------------------------------------------------

#[test]
fn native_vault_settles_and_redeems_to_third_party() {
    let config = VaultConfig::devnet(AssetId::Native);
    let bridge = config.l1_bridge;
    let mut bank = MemoryBank::new();
    bank.mint(AssetId::Native, OWNER, eth("50")).unwrap();
    bank.mint(AssetId::Native, bridge, eth("100")).unwrap();

    let mut vault = Vault::new(config, OWNER, bank).unwrap();
    vault.grant_role(OWNER, Role::Process, RELAYER).unwrap();

    vault.deposit(OWNER, eth("50"), OWNER).unwrap();
    vault
        .handle_bridge_users(
            RELAYER,
            &[posting(USER2, "25", 1, 1), posting(USER2, "25", 2, 2)],
        )
        .unwrap();
    vault.execute_batch(RELAYER, &payload(0, "50", "0.5")).unwrap();
    assert_eq!(vault.liquid_balance(), eth("50.5"));
    assert_eq!(vault.last_processed_block(), 2);

    vault.redeem(OWNER, eth("50"), USER1, OWNER).unwrap();
    assert_eq!(
        vault.bank().balance_of(AssetId::Native, USER1),
        eth("50.499999999999999999")
    );
    assert_eq!(vault.bank().balance_of(AssetId::Native, USER2), eth("50"));
}

// ---------------------------------------------------------------------------
// Pause & sweeps
// ---------------------------------------------------------------------------

#[test]
fn pause_gates_only_settlement() {
    let mut vault = weth_vault();
    vault.pause(OWNER).unwrap();

    let err = vault
        .execute_batch(OWNER, &payload(123, "1.0", "0.01"))
        .unwrap_err();
    assert_eq!(err, VaultError::Paused);
    assert_eq!(err.to_string(), "Pausable: paused");

    vault.deposit(USER1, eth("10"), USER1).unwrap();
    vault
        .handle_bridge_users(RELAYER, &[posting(RANDOM, "5", 0, 1)])
        .unwrap();
    vault.redeem(USER1, eth("1"), USER1, USER1).unwrap();

    vault.unpause(OWNER).unwrap();
    vault.execute_batch(RELAYER, &payload(0, "5", "0")).unwrap();
}

#[test]
fn harvest_sweeps_only_underlying_surplus() {
    let mut vault = weth_vault();
    vault.deposit(USER1, eth("50"), USER1).unwrap();
    let address = vault.address();
    vault
        .bank_mut()
        .transfer(AssetId::Token(WETH), USER2, address, eth("100"))
        .unwrap();
    assert_eq!(weth_of(&vault, address), eth("150"));

    let swept = vault.harvest_erc20(OWNER, WETH).unwrap();
    assert_eq!(swept, eth("100"));
    assert_eq!(weth_of(&vault, address), eth("50"));
    assert_eq!(weth_of(&vault, OWNER), eth("100"));
    assert_buckets(&vault, "50", "0");
}

#[test]
fn harvest_eth_goes_to_treasury_when_configured() {
    let treasury = Address::repeat_byte(0x7e);
    let config = VaultConfig {
        treasury: Some(treasury),
        ..VaultConfig::devnet(AssetId::Token(WETH))
    };
    let address = config.address;
    let mut bank = MemoryBank::new();
    bank.mint(AssetId::Native, address, eth("100")).unwrap();
    let mut vault = Vault::new(config, OWNER, bank).unwrap();

    assert_eq!(vault.harvest_eth(OWNER).unwrap(), eth("100"));
    assert_eq!(vault.bank().balance_of(AssetId::Native, address), U256::ZERO);
    assert_eq!(vault.bank().balance_of(AssetId::Native, treasury), eth("100"));
    assert_eq!(vault.harvest_eth(OWNER).unwrap(), U256::ZERO);
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn supply_matches_balances_and_cursors_only_move_forward() {
    let mut vault = weth_vault();
    let mut last_block = vault.last_processed_block();
    let mut last_nonce = vault.last_settled_nonce();

    let mut check = |vault: &Vault<MemoryBank>| {
        assert_eq!(vault.ledger().shares().sum_of_balances(), vault.total_shares());
        assert!(vault.last_processed_block() >= last_block);
        assert!(vault.last_settled_nonce() >= last_nonce);
        assert!(weth_of(vault, vault.address()) >= vault.liquid_balance());
        last_block = vault.last_processed_block();
        last_nonce = vault.last_settled_nonce();
    };

    vault.deposit(USER1, eth("30"), USER1).unwrap();
    check(&vault);
    vault.mint(USER2, eth("20"), USER1).unwrap();
    check(&vault);
    vault
        .handle_bridge_users(RELAYER, &[posting(RANDOM, "12", 0, 4)])
        .unwrap();
    check(&vault);
    vault.execute_batch(RELAYER, &payload(0, "12", "0.12")).unwrap();
    check(&vault);
    vault.transfer(USER1, USER2, eth("5")).unwrap();
    check(&vault);
    vault.withdraw(USER2, eth("4"), USER2, USER2).unwrap();
    check(&vault);
}
