//! Scripted `PerpetualsClient` for exercising the store, cache and sweep.

use async_trait::async_trait;
use parking_lot::Mutex;
use perps_chain::{
    ChainError, ChainResult, Custody, LiquidationState, OracleParams, OracleType,
    PerpetualsClient, Position, Pubkey, Signature,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted answer of the liquidation view for one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Healthy,
    Liquidatable,
    Fails,
    Closed,
    /// Never answers within any reasonable timeout.
    Hangs,
}

#[derive(Default)]
pub struct FakeClient {
    pub liquidator: Pubkey,
    positions: Mutex<Vec<Position>>,
    list_fails: Mutex<bool>,
    custodies: Mutex<HashMap<Pubkey, Custody>>,
    evaluations: Mutex<HashMap<Pubkey, Evaluation>>,
    failing_submissions: Mutex<HashSet<Pubkey>>,
    latency: Mutex<Option<Duration>>,

    pub list_calls: AtomicUsize,
    pub custody_calls: AtomicUsize,
    pub evaluated: Mutex<Vec<Pubkey>>,
    pub submitted: Mutex<Vec<Pubkey>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            liquidator: Pubkey::new_unique(),
            ..Default::default()
        }
    }

    /// Add a custody and `count` healthy positions on it.
    pub fn with_positions(self, count: usize) -> (Self, Vec<Position>) {
        let custody = self.add_custody();
        let positions: Vec<Position> = (0..count).map(|_| position_on(&custody)).collect();
        self.set_positions(positions.clone());
        (self, positions)
    }

    pub fn add_custody(&self) -> Custody {
        let custody = custody(Pubkey::new_unique());
        self.custodies.lock().insert(custody.address, custody.clone());
        custody
    }

    pub fn set_positions(&self, positions: Vec<Position>) {
        *self.positions.lock() = positions;
    }

    pub fn set_list_fails(&self, fails: bool) {
        *self.list_fails.lock() = fails;
    }

    pub fn set_evaluation(&self, position: &Position, evaluation: Evaluation) {
        self.evaluations.lock().insert(position.address, evaluation);
    }

    pub fn fail_submission(&self, position: &Position) {
        self.failing_submissions.lock().insert(position.address);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn custody_calls(&self) -> usize {
        self.custody_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<Pubkey> {
        self.submitted.lock().clone()
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl PerpetualsClient for FakeClient {
    async fn list_open_positions(&self) -> ChainResult<Vec<Position>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if *self.list_fails.lock() {
            return Err(ChainError::Timeout(Duration::from_secs(30)));
        }
        Ok(self.positions.lock().clone())
    }

    async fn fetch_custody(&self, address: Pubkey) -> ChainResult<Custody> {
        self.custody_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.custodies
            .lock()
            .get(&address)
            .cloned()
            .ok_or(ChainError::AccountNotFound(address))
    }

    async fn evaluate_liquidation(
        &self,
        position: &Position,
        _custody: &Custody,
    ) -> ChainResult<LiquidationState> {
        self.evaluated.lock().push(position.address);
        let evaluation = self
            .evaluations
            .lock()
            .get(&position.address)
            .copied()
            .unwrap_or(Evaluation::Healthy);
        match evaluation {
            Evaluation::Healthy => Ok(LiquidationState::HEALTHY),
            Evaluation::Liquidatable => Ok(LiquidationState(1)),
            Evaluation::Fails => Err(ChainError::Simulation {
                err: "custom program error: 0x1771".to_string(),
                logs: Vec::new(),
            }),
            Evaluation::Closed => Err(ChainError::PositionClosed(position.address)),
            Evaluation::Hangs => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(LiquidationState::HEALTHY)
            }
        }
    }

    async fn submit_liquidation(
        &self,
        position: &Position,
        _custody: &Custody,
    ) -> ChainResult<Signature> {
        self.submitted.lock().push(position.address);
        if self.failing_submissions.lock().contains(&position.address) {
            return Err(ChainError::Simulation {
                err: "account already in use".to_string(),
                logs: Vec::new(),
            });
        }
        Ok(Signature::new_unique())
    }

    fn liquidator(&self) -> Pubkey {
        self.liquidator
    }
}

pub fn custody(address: Pubkey) -> Custody {
    Custody {
        address,
        pool: Pubkey::new_unique(),
        mint: Pubkey::new_unique(),
        token_account: Pubkey::new_unique(),
        decimals: 9,
        oracle: OracleParams {
            oracle_account: Pubkey::new_unique(),
            oracle_type: OracleType::Pyth,
            oracle_authority: Pubkey::new_unique(),
            max_price_error: 10_000,
            max_price_age_sec: 60,
        },
    }
}

pub fn position_on(custody: &Custody) -> Position {
    Position {
        address: Pubkey::new_unique(),
        owner: Pubkey::new_unique(),
        pool: custody.pool,
        custody: custody.address,
        open_time: 1_700_000_000,
        update_time: 1_700_000_000,
        price: 25_000_000,
        size_usd: 1_000_000_000,
        borrow_size_usd: 0,
        collateral_usd: 100_000_000,
        unrealized_profit_usd: 0,
        unrealized_loss_usd: 0,
        cumulative_interest_snapshot: 0,
        locked_amount: 40_000_000,
        collateral_amount: 4_000_000,
        bump: 255,
    }
}
