use crate::interface::VaultApi;
use crate::vault::{KeyShareSet, UnsealProgress, VaultError, VaultHealth};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tracing::info;

/// In-process Vault that follows the threshold unseal protocol: it counts
/// distinct valid shares and unseals once `threshold` of them were seen.
pub struct SimulatedVault {
    state: Mutex<SimState>,
    /// Status codes returned by the next probes before falling back to the
    /// simulated state.
    scripted_health: Mutex<VecDeque<u16>>,
    pub unreachable: AtomicBool,
    pub probe_calls: AtomicUsize,
    pub init_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    /// Shares left out of the next init response.
    pub withheld_shares: AtomicUsize,
}

struct SimState {
    initialized: bool,
    sealed: bool,
    standby: bool,
    /// Shares the vault requires; a misconfigured vault may want more than
    /// the caller was told.
    threshold: usize,
    shares: Vec<String>,
    seen: HashSet<String>,
}

impl SimulatedVault {
    /// A freshly started, never initialized server.
    pub fn uninitialized() -> Self {
        Self::with_state(SimState {
            initialized: false,
            sealed: true,
            standby: false,
            threshold: 0,
            shares: Vec::new(),
            seen: HashSet::new(),
        })
    }

    /// An initialized server that was restarted and is sealed again.
    pub fn sealed_with(set: &KeyShareSet, threshold: usize) -> Self {
        Self::with_state(SimState {
            initialized: true,
            sealed: true,
            standby: false,
            threshold,
            shares: set.shares.clone(),
            seen: HashSet::new(),
        })
    }

    pub fn unsealed() -> Self {
        let vault = Self::sealed_with(&sample_key_shares(), 3);
        vault.state.lock().unwrap().sealed = false;
        vault
    }

    pub fn standby() -> Self {
        let vault = Self::unsealed();
        vault.state.lock().unwrap().standby = true;
        vault
    }

    fn with_state(state: SimState) -> Self {
        Self {
            state: Mutex::new(state),
            scripted_health: Mutex::new(VecDeque::new()),
            unreachable: AtomicBool::new(false),
            probe_calls: AtomicUsize::new(0),
            init_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            withheld_shares: AtomicUsize::new(0),
        }
    }

    pub fn script_health(&self, codes: &[u16]) {
        self.scripted_health.lock().unwrap().extend(codes);
    }

    /// Seal again, as after a restart. Unseal progress resets.
    pub fn reseal(&self) {
        let mut state = self.state.lock().unwrap();
        state.sealed = true;
        state.seen.clear();
    }

    pub fn is_sealed(&self) -> bool {
        self.state.lock().unwrap().sealed
    }

    pub fn issued_shares(&self) -> Vec<String> {
        self.state.lock().unwrap().shares.clone()
    }

    pub fn inits(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VaultApi for SimulatedVault {
    async fn probe(&self) -> Result<VaultHealth, VaultError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(VaultError::Unreachable("connection refused".to_string()));
        }
        if let Some(code) = self.scripted_health.lock().unwrap().pop_front() {
            return Ok(VaultHealth::from_status(code));
        }
        let state = self.state.lock().unwrap();
        let code = match (state.initialized, state.sealed, state.standby) {
            (false, _, _) => 501,
            (true, true, _) => 503,
            (true, false, true) => 429,
            (true, false, false) => 200,
        };
        Ok(VaultHealth::from_status(code))
    }

    async fn initialize(
        &self,
        shares: usize,
        threshold: usize,
    ) -> Result<KeyShareSet, VaultError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.initialized {
            return Err(VaultError::HttpStatus(
                400,
                "Vault is already initialized".to_string(),
            ));
        }
        let nonce = self.init_calls.load(Ordering::SeqCst);
        state.initialized = true;
        state.threshold = threshold;
        state.shares = (1..=shares)
            .map(|i| format!("{:02x}{:062x}", nonce, i * 7919))
            .collect();
        let returned = shares.saturating_sub(self.withheld_shares.load(Ordering::SeqCst));
        Ok(KeyShareSet {
            root_token: format!("hvs.root-{}", nonce),
            shares: state.shares[..returned].to_vec(),
        })
    }

    async fn submit_share(&self, share: &str) -> Result<UnsealProgress, VaultError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if !state.initialized {
            return Err(VaultError::HttpStatus(
                400,
                "Vault is not initialized".to_string(),
            ));
        }
        if !state.shares.iter().any(|s| s == share) {
            return Err(VaultError::HttpStatus(
                400,
                "invalid key: failed to decrypt keyring".to_string(),
            ));
        }
        if state.sealed {
            state.seen.insert(share.to_string());
            if state.seen.len() >= state.threshold {
                state.sealed = false;
                state.seen.clear();
            }
        }
        Ok(UnsealProgress {
            sealed: state.sealed,
            threshold: state.threshold as u32,
            total_shares: state.shares.len() as u32,
            progress: state.seen.len() as u32,
        })
    }
}

pub fn sample_key_shares() -> KeyShareSet {
    KeyShareSet {
        root_token: "hvs.sample-root".to_string(),
        shares: (1..=5).map(|i| format!("{:064x}", i * 104729)).collect(),
    }
}

/// Starts a non-dev Vault container, which boots uninitialized and sealed.
pub async fn setup_vault_container() -> ContainerAsync<GenericImage> {
    let vault_local_config = r#"
    {"storage": {"file": {"path": "/vault/file"}},
     "listener": [{"tcp": { "address": "0.0.0.0:8200", "tls_disable": true}}],
     "disable_mlock": true}
    "#;
    let container = GenericImage::new("hashicorp/vault", "1.18.4")
        .with_exposed_port(8200.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Vault server started!"))
        .with_env_var("VAULT_LOCAL_CONFIG", vault_local_config)
        .with_cmd(vec!["server"])
        .start()
        .await
        .expect("Failed to start container");
    info!("Vault container started");
    container
}
