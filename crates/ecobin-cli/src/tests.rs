#![allow(clippy::unwrap_used)]
//! Command tests against an in-memory database and a temporary state dir.

use std::path::PathBuf;

use tempfile::TempDir;

use ecobin_core::Config;
use ecobin_core::config::DEFAULT_BIN_CODE;
use ecobin_ledger::storage::RewardsDatabase;

use crate::Outcome;
use crate::app::App;
use crate::auth_cmd::{self, AuthAction};
use crate::config::CliState;
use crate::rewards_cmd::{self, RewardsCommand};

const SECRET: &[u8] = b"cli-test-secret";

struct Harness {
    app: App,
    db: RewardsDatabase,
    config: Config,
    state_path: PathBuf,
    _dir: TempDir,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    async fn with_config(config: Config) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("credentials.json");
        let db = RewardsDatabase::open_in_memory().await.unwrap();
        let app = App::new(db.clone(), &config, SECRET, state_path.clone());
        Self {
            app,
            db,
            config,
            state_path,
            _dir: dir,
        }
    }

    /// A fresh `App` over the same database and state file, like a second
    /// invocation of the binary.
    fn reopen(&self) -> App {
        App::new(
            self.db.clone(),
            &self.config,
            SECRET,
            self.state_path.clone(),
        )
    }

    async fn auth(&mut self, action: AuthAction) -> (Outcome, String) {
        let mut out = Vec::new();
        let outcome = auth_cmd::run(action, &mut self.app, &mut out).await.unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    async fn rewards(&mut self, command: RewardsCommand) -> (Outcome, String) {
        let mut out = Vec::new();
        let outcome = rewards_cmd::run(command, &mut self.app, &mut out)
            .await
            .unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    async fn register(&mut self) {
        let (outcome, out) = self
            .auth(AuthAction::Register {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password: "hunter22".into(),
            })
            .await;
        assert_eq!(outcome, Outcome::Done, "{out}");
    }

    async fn scan(&mut self, code: &str) -> (Outcome, String) {
        self.rewards(RewardsCommand::Scan {
            code: Some(code.into()),
            stdin: false,
        })
        .await
    }
}

fn no_cooldown() -> Config {
    let mut config = Config::default();
    config.ledger.cooldown_secs = 0;
    config
}

#[tokio::test]
async fn register_persists_credentials() {
    let mut h = Harness::new().await;
    h.register().await;

    let state = CliState::load_from(&h.state_path);
    let creds = state.auth.unwrap();
    assert_eq!(creds.username, "alice");
    assert!(!creds.refresh_token.is_empty());
}

#[tokio::test]
async fn register_with_short_password_is_rejected() {
    let mut h = Harness::new().await;
    let (outcome, out) = h
        .auth(AuthAction::Register {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "123".into(),
        })
        .await;
    assert_eq!(outcome, Outcome::Rejected);
    assert!(out.starts_with("[warning]"), "{out}");
    assert!(CliState::load_from(&h.state_path).auth.is_none());
}

#[tokio::test]
async fn scan_requires_login() {
    let mut h = Harness::new().await;
    let (outcome, out) = h.scan(DEFAULT_BIN_CODE).await;
    assert_eq!(outcome, Outcome::Rejected);
    assert!(out.contains("Please log in to scan QR codes."), "{out}");
}

#[tokio::test]
async fn scan_awards_points_then_cools_down() {
    let mut h = Harness::new().await;
    h.register().await;

    let (outcome, out) = h.scan(DEFAULT_BIN_CODE).await;
    assert_eq!(outcome, Outcome::Done);
    assert!(out.contains("+10 points added!"), "{out}");
    assert!(out.contains("Points: 10"), "{out}");

    let (outcome, out) = h.scan(DEFAULT_BIN_CODE).await;
    assert_eq!(outcome, Outcome::Rejected);
    assert!(out.contains("Please wait 5 more minute(s)"), "{out}");
}

#[tokio::test]
async fn scan_of_wrong_code_is_rejected() {
    let mut h = Harness::new().await;
    h.register().await;

    let (outcome, out) = h.scan("https://example.com/not-a-bin").await;
    assert_eq!(outcome, Outcome::Rejected);
    assert!(out.contains("Invalid QR Code"), "{out}");
}

#[tokio::test]
async fn scan_lines_processes_each_line() {
    let mut h = Harness::with_config(no_cooldown()).await;
    h.register().await;

    let input = format!("{DEFAULT_BIN_CODE}\n\n  {DEFAULT_BIN_CODE}  \nnot-the-bin\n");
    let mut out = Vec::new();
    let outcome = rewards_cmd::scan_lines(&h.app, input.as_bytes(), &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();

    assert_eq!(outcome, Outcome::Rejected);
    assert_eq!(out.matches("+10 points added!").count(), 2, "{out}");
    assert!(out.contains("Points: 20"), "{out}");
    assert!(out.contains("Invalid QR Code"), "{out}");
}

#[tokio::test]
async fn redeem_then_dashboard() {
    let mut h = Harness::with_config(no_cooldown()).await;
    h.register().await;
    for _ in 0..3 {
        assert_eq!(h.scan(DEFAULT_BIN_CODE).await.0, Outcome::Done);
    }

    let (outcome, out) = h
        .rewards(RewardsCommand::Redeem {
            coupon_id: "coupon6".into(),
        })
        .await;
    assert_eq!(outcome, Outcome::Done, "{out}");
    assert!(out.contains("Coupon \"Free Eco-Bag\" redeemed!"), "{out}");
    assert!(out.contains("Points: 0"), "{out}");

    let (outcome, out) = h.rewards(RewardsCommand::Dashboard).await;
    assert_eq!(outcome, Outcome::Done);
    assert!(out.contains("Points:   0"), "{out}");
    assert!(out.contains("Scans:    3"), "{out}");
    assert!(out.contains("Redeemed: 1"), "{out}");
    assert!(out.contains("Redeemed: Free Eco-Bag"), "{out}");
}

#[tokio::test]
async fn redeem_without_enough_points() {
    let mut h = Harness::new().await;
    h.register().await;

    let (outcome, out) = h
        .rewards(RewardsCommand::Redeem {
            coupon_id: "coupon1".into(),
        })
        .await;
    assert_eq!(outcome, Outcome::Rejected);
    assert!(out.contains("Insufficient points!"), "{out}");
}

#[tokio::test]
async fn coupons_show_balance_and_labels() {
    let mut h = Harness::new().await;
    h.register().await;

    let (outcome, out) = h.rewards(RewardsCommand::Coupons).await;
    assert_eq!(outcome, Outcome::Done);
    assert!(out.starts_with("Points: 0\n"), "{out}");
    assert_eq!(out.matches("[Insufficient Points]").count(), 6, "{out}");
}

#[tokio::test]
async fn history_when_signed_out() {
    let mut h = Harness::new().await;
    let (outcome, out) = h.rewards(RewardsCommand::History).await;
    assert_eq!(outcome, Outcome::Rejected);
    assert!(out.contains("Please log in to view your points."), "{out}");
}

#[tokio::test]
async fn bin_code_prints_configured_text() {
    let mut h = Harness::new().await;
    let (outcome, out) = h.rewards(RewardsCommand::BinCode).await;
    assert_eq!(outcome, Outcome::Done);
    assert_eq!(out, format!("{DEFAULT_BIN_CODE}\n"));
}

#[tokio::test]
async fn session_survives_new_invocation() {
    let mut h = Harness::new().await;
    h.register().await;
    assert_eq!(h.scan(DEFAULT_BIN_CODE).await.0, Outcome::Done);

    h.app = h.reopen();
    let (outcome, out) = h.auth(AuthAction::Status).await;
    assert_eq!(outcome, Outcome::Done);
    assert!(out.contains("Logged in as: alice"), "{out}");
    assert!(out.contains("Points: 10"), "{out}");
}

#[tokio::test]
async fn logout_clears_credentials() {
    let mut h = Harness::new().await;
    h.register().await;

    let (outcome, out) = h.auth(AuthAction::Logout).await;
    assert_eq!(outcome, Outcome::Done);
    assert!(out.contains("Logged out successfully!"), "{out}");
    assert!(CliState::load_from(&h.state_path).auth.is_none());

    h.app = h.reopen();
    let (_, out) = h.auth(AuthAction::Status).await;
    assert!(out.contains("Not logged in"), "{out}");
}

#[tokio::test]
async fn invalid_stored_token_is_forgotten() {
    let mut h = Harness::new().await;
    h.register().await;

    let mut state = CliState::load_from(&h.state_path);
    let creds = state.auth.as_mut().unwrap();
    creds.access_token = "garbage".into();
    creds.refresh_token = "garbage".into();
    state.save_to(&h.state_path).unwrap();

    h.app = h.reopen();
    let (outcome, out) = h.auth(AuthAction::Status).await;
    assert_eq!(outcome, Outcome::Done);
    assert!(out.contains("Your session has expired"), "{out}");
    assert!(out.contains("Not logged in"), "{out}");
    assert!(CliState::load_from(&h.state_path).auth.is_none());
}

#[tokio::test]
async fn login_by_email_after_logout() {
    let mut h = Harness::new().await;
    h.register().await;
    h.auth(AuthAction::Logout).await;

    let (outcome, out) = h
        .auth(AuthAction::Login {
            login: "alice@example.com".into(),
            password: "hunter22".into(),
        })
        .await;
    assert_eq!(outcome, Outcome::Done, "{out}");
    assert!(out.contains("Logged in as alice"), "{out}");

    let (outcome, out) = h
        .auth(AuthAction::Login {
            login: "alice".into(),
            password: "wrong-password".into(),
        })
        .await;
    assert_eq!(outcome, Outcome::Rejected);
    assert!(out.contains("Invalid login credentials."), "{out}");
}

#[tokio::test]
async fn password_reset_flow() {
    let mut h = Harness::new().await;
    h.register().await;

    let (outcome, out) = h
        .auth(AuthAction::Forgot {
            email: "alice@example.com".into(),
        })
        .await;
    assert_eq!(outcome, Outcome::Done);
    let token = out
        .lines()
        .find_map(|l| l.strip_prefix("Recovery token: "))
        .unwrap()
        .to_string();

    let (outcome, out) = h
        .auth(AuthAction::Reset {
            token,
            password: "new-password".into(),
        })
        .await;
    assert_eq!(outcome, Outcome::Done, "{out}");
    assert!(out.contains("Password updated successfully!"), "{out}");
    assert!(CliState::load_from(&h.state_path).auth.is_none());

    let (outcome, _) = h
        .auth(AuthAction::Login {
            login: "alice".into(),
            password: "new-password".into(),
        })
        .await;
    assert_eq!(outcome, Outcome::Done);
}

#[tokio::test]
async fn forgot_for_unknown_email_prints_no_token() {
    let mut h = Harness::new().await;
    let (outcome, out) = h
        .auth(AuthAction::Forgot {
            email: "nobody@example.com".into(),
        })
        .await;
    assert_eq!(outcome, Outcome::Done);
    assert!(!out.contains("Recovery token"), "{out}");
}
