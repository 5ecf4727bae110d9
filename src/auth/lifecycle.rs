use std::sync::atomic::AtomicBool;

use crate::api::{AuthApi, AuthCode, Endpoint, HostInfo};
use crate::config::{ConfigContext, Settings};
use crate::desktop::Desktop;
use crate::env::Environment;
use crate::error::{CliError, Result};
use crate::store::{Scope, TokenRecord};

use super::resolver::{resolve_scope, Resolution, ScopeRequest};
use super::session::{AuthSession, Clock};

/// A token that a login is about to supersede, copied out of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRevocation {
    pub scope: Scope,
    pub record: TokenRecord,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub scope: Scope,
    pub cwd: Scope,
    pub overwrite: bool,
    pub copy_code: bool,
    /// Open the browser without asking
    pub yes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub scope: Scope,
    pub name: String,
    /// `Some(true)` when a superseded token was revoked, `Some(false)` when that failed
    pub previous_revoked: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    pub token: String,
    pub updated: Vec<Scope>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevokeOptions {
    pub update_config: bool,
    pub update_enclave_config: bool,
    /// Remove local entries even when the server refuses the revocation
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevokeOutcome {
    pub removed: Vec<Scope>,
    pub cleared_enclave: Vec<Scope>,
}

/// Login, roll and revoke against one config context
pub struct TokenLifecycle<'a> {
    api: &'a dyn AuthApi,
    clock: &'a dyn Clock,
    env: Environment,
    host: HostInfo,
    interrupt: Option<&'a AtomicBool>,
}

impl<'a> TokenLifecycle<'a> {
    pub fn new(api: &'a dyn AuthApi, clock: &'a dyn Clock, env: Environment) -> Self {
        Self {
            api,
            clock,
            env,
            host: HostInfo::detect(),
            interrupt: None,
        }
    }

    #[cfg(test)]
    pub fn with_host(mut self, host: HostInfo) -> Self {
        self.host = host;
        self
    }

    #[cfg(test)]
    pub fn with_interrupt(mut self, flag: &'a AtomicBool) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Authenticate and store the new token under the resolved scope.
    ///
    /// Nothing is written unless the session completes. A token previously
    /// stored at the final scope is revoked afterwards on a best-effort basis.
    pub fn login(
        &self,
        ctx: &mut ConfigContext,
        request: &LoginRequest,
        desktop: &Desktop<'_>,
    ) -> Result<LoginOutcome> {
        let existing = ctx.store().get(&request.scope).map(|_| request.scope.clone());
        let resolution = resolve_scope(
            ScopeRequest {
                requested: &request.scope,
                cwd: &request.cwd,
                existing: existing.as_ref(),
                overwrite: request.overwrite,
                interactive: self.env.interactive,
            },
            desktop.prompter,
        )?;

        let scope = match resolution {
            Resolution::Proceed(scope) => scope,
            Resolution::Abort => return Err(CliError::Aborted),
        };

        let pending = ctx.store().get(&scope).map(|record| PendingRevocation {
            scope: scope.clone(),
            record: record.clone(),
        });

        // a re-login stays on the host of the token it replaces
        let endpoint = match &pending {
            Some(pending) => effective_endpoint(ctx.settings(), &pending.record),
            None => Endpoint::new(ctx.settings().api_host.clone(), ctx.settings().verify_tls),
        };
        let mut session = AuthSession::new(self.api, self.clock, endpoint.clone());
        if let Some(flag) = self.interrupt {
            session = session.with_interrupt(flag);
        }
        let outcome = session.run(&self.host, |code| self.present_code(code, request, desktop));
        tracing::debug!(
            "Auth session ended {:?} after {} polls",
            session.phase(),
            session.polls()
        );
        let grant = outcome.into_result()?;

        let record = TokenRecord {
            token: grant.token,
            api_host: endpoint.host,
            dashboard_host: grant.dashboard_url,
            verify_tls: endpoint.verify_tls,
        };
        tracing::debug!("Storing token {} for scope {}", record.fingerprint(), scope);
        ctx.store_mut().set(scope.clone(), record);
        ctx.persist()?;

        let previous_revoked = pending
            .as_ref()
            .map(|pending| self.revoke_superseded(pending, ctx.settings()));

        Ok(LoginOutcome {
            scope,
            name: grant.name,
            previous_revoked,
        })
    }

    /// Replace the scope's token with a freshly issued one
    pub fn roll(
        &self,
        ctx: &mut ConfigContext,
        scope: &Scope,
        update_config: bool,
    ) -> Result<RollOutcome> {
        let record = ctx
            .store()
            .get(scope)
            .cloned()
            .ok_or(CliError::MissingValue("token"))?;

        let endpoint = effective_endpoint(ctx.settings(), &record);
        let rolled = self.api.roll_auth_token(&endpoint, &record.token)?;
        tracing::debug!(
            "Rolled token {} into {}",
            record.fingerprint(),
            crate::store::token_fingerprint(&rolled.token)
        );

        let updated = if update_config {
            let updated = ctx.store_mut().replace_token(&record.token, &rolled.token);
            // the server has already retired the old token
            if let Err(err) = ctx.persist() {
                return Err(CliError::UnsavedToken {
                    token: rolled.token,
                    reason: err.to_string(),
                });
            }
            updated
        } else {
            Vec::new()
        };

        Ok(RollOutcome {
            token: rolled.token,
            updated,
        })
    }

    /// Invalidate the scope's token remotely and forget it locally
    pub fn revoke(
        &self,
        ctx: &mut ConfigContext,
        scope: &Scope,
        options: RevokeOptions,
    ) -> Result<RevokeOutcome> {
        let record = ctx
            .store()
            .get(scope)
            .cloned()
            .ok_or(CliError::MissingValue("token"))?;

        let endpoint = effective_endpoint(ctx.settings(), &record);
        let remote = self.api.revoke_auth_token(&endpoint, &record.token);

        match remote {
            Ok(()) => {
                tracing::debug!("Token {} revoked", record.fingerprint());
                if !options.update_config {
                    return Ok(RevokeOutcome::default());
                }
                let outcome = remove_token(ctx, &record.token, options.update_enclave_config);
                ctx.persist()?;
                Ok(outcome)
            }
            Err(err) if options.force && options.update_config => {
                eprintln!("Warning: remote revocation failed, removing local entries anyway");
                remove_token(ctx, &record.token, options.update_enclave_config);
                ctx.persist()?;
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn present_code(
        &self,
        code: &AuthCode,
        request: &LoginRequest,
        desktop: &Desktop<'_>,
    ) -> Result<()> {
        if request.copy_code {
            if let Err(err) = desktop.clipboard.copy(&code.code) {
                eprintln!("Unable to copy to clipboard");
                tracing::debug!("{}", err);
            }
        }

        let open_browser = !self.env.headless
            && (request.yes
                || (self.env.interactive
                    && desktop
                        .prompter
                        .confirm("Open the authorization page in your browser?", true)?));

        let mut print_url = !open_browser;
        if open_browser {
            if let Err(err) = desktop.browser.open(&code.auth_url) {
                eprintln!("Unable to launch a browser");
                tracing::debug!("{}", err);
                print_url = true;
            }
        }

        if print_url {
            eprintln!("Complete authorization at {}", code.auth_url);
        }
        eprintln!("Your auth code is {}", code.code);
        eprintln!("Waiting...");
        Ok(())
    }

    fn revoke_superseded(&self, pending: &PendingRevocation, settings: &Settings) -> bool {
        tracing::debug!("Revoking previous token {}", pending.record.fingerprint());
        let endpoint = effective_endpoint(settings, &pending.record);
        match self.api.revoke_auth_token(&endpoint, &pending.record.token) {
            Ok(()) => {
                tracing::debug!("Token successfully revoked");
                true
            }
            Err(err) => {
                tracing::debug!("Failed to revoke token: {}", err);
                false
            }
        }
    }
}

/// The stored endpoint, unless the user pointed this run somewhere else
fn effective_endpoint(settings: &Settings, record: &TokenRecord) -> Endpoint {
    let mut endpoint = record.endpoint();
    if settings.api_host_override {
        endpoint.host = settings.api_host.clone();
    }
    endpoint.verify_tls &= settings.verify_tls;
    endpoint
}

fn remove_token(ctx: &mut ConfigContext, token: &str, clear_enclave: bool) -> RevokeOutcome {
    let mut outcome = RevokeOutcome::default();
    for scope in ctx.store().scopes_with_token(token) {
        let store = ctx.store_mut();
        store.delete(&scope);
        if clear_enclave && store.clear_enclave(&scope).is_some() {
            outcome.cleared_enclave.push(scope.clone());
        }
        outcome.removed.push(scope);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockAuthApi, RolledToken, TokenExchange};
    use crate::auth::session::tests::{expect_code, grant, host, VirtualClock};
    use crate::config::tests::settings_in;
    use crate::desktop::{Browser, Clipboard, MockPrompter};
    use crate::store::tests::{record, scope};
    use crate::store::EnclaveConfig;
    use std::cell::RefCell;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingClipboard {
        copied: RefCell<Vec<String>>,
    }

    impl Clipboard for RecordingClipboard {
        fn copy(&self, text: &str) -> Result<()> {
            self.copied.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingBrowser {
        opened: RefCell<Vec<String>>,
        fail: bool,
    }

    impl Browser for RecordingBrowser {
        fn open(&self, url: &str) -> Result<()> {
            self.opened.borrow_mut().push(url.to_string());
            if self.fail {
                Err(CliError::BrowserLaunchFailed("no browser".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn interactive() -> Environment {
        Environment {
            interactive: true,
            headless: false,
        }
    }

    fn unattended() -> Environment {
        Environment {
            interactive: false,
            headless: true,
        }
    }

    fn context(dir: &TempDir) -> ConfigContext {
        ConfigContext::load(settings_in(dir.path())).unwrap()
    }

    fn login_request(requested: Scope, cwd: Scope) -> LoginRequest {
        LoginRequest {
            scope: requested,
            cwd,
            overwrite: false,
            copy_code: true,
            yes: true,
        }
    }

    fn grant_on_first_poll(api: &mut MockAuthApi, token: &'static str) {
        api.expect_get_auth_token()
            .times(1)
            .returning(move |_, _| Ok(TokenExchange::Granted(grant(token))));
    }

    #[test]
    fn test_login_into_empty_store() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let project = scope("/project");

        let mut api = MockAuthApi::new();
        expect_code(&mut api);
        grant_on_first_poll(&mut api, "tok_123");
        api.expect_revoke_auth_token().never();

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, interactive()).with_host(host());
        let prompter = MockPrompter::new();
        let clipboard = RecordingClipboard::default();
        let browser = RecordingBrowser::default();
        let desktop = Desktop {
            prompter: &prompter,
            clipboard: &clipboard,
            browser: &browser,
        };

        let outcome = lifecycle
            .login(&mut ctx, &login_request(project.clone(), project.clone()), &desktop)
            .unwrap();

        assert_eq!(outcome.scope, project);
        assert_eq!(outcome.name, "Alice");
        assert_eq!(outcome.previous_revoked, None);

        let entries: Vec<_> = ctx.store().all().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, &project);
        assert_eq!(entries[0].1.token, "tok_123");
        assert_eq!(entries[0].1.dashboard_host, "https://dashboard.keyscope.dev");

        assert_eq!(clipboard.copied.borrow().as_slice(), ["ABCD-1234".to_string()]);
        assert_eq!(browser.opened.borrow().len(), 1);

        let on_disk = crate::store::ScopeStore::load(ctx.path()).unwrap();
        assert_eq!(on_disk.get(&project).unwrap().token, "tok_123");
    }

    #[test]
    fn test_overwrite_confirmed_revokes_old_token_once() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        ctx.store_mut().set(Scope::root(), record("old"));

        let mut api = MockAuthApi::new();
        expect_code(&mut api);
        grant_on_first_poll(&mut api, "new");
        api.expect_revoke_auth_token()
            .withf(|_, token| token == "old")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut prompter = MockPrompter::new();
        prompter
            .expect_confirm()
            .withf(|prompt, _| prompt == "Overwrite existing login?")
            .times(1)
            .returning(|_, _| Ok(true));

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, interactive()).with_host(host());
        let clipboard = RecordingClipboard::default();
        let browser = RecordingBrowser::default();
        let desktop = Desktop {
            prompter: &prompter,
            clipboard: &clipboard,
            browser: &browser,
        };

        let outcome = lifecycle
            .login(
                &mut ctx,
                &login_request(Scope::root(), Scope::root()),
                &desktop,
            )
            .unwrap();

        assert_eq!(outcome.previous_revoked, Some(true));
        assert_eq!(ctx.store().len(), 1);
        assert_eq!(ctx.store().get(&Scope::root()).unwrap().token, "new");
    }

    #[test]
    fn test_declined_overwrite_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        ctx.store_mut().set(Scope::root(), record("old"));
        ctx.persist().unwrap();
        let before = ctx.store().clone();

        let mut api = MockAuthApi::new();
        api.expect_generate_auth_code().never();
        api.expect_revoke_auth_token().never();

        let mut prompter = MockPrompter::new();
        prompter.expect_confirm().times(1).returning(|_, _| Ok(false));

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, interactive()).with_host(host());
        let clipboard = RecordingClipboard::default();
        let browser = RecordingBrowser::default();
        let desktop = Desktop {
            prompter: &prompter,
            clipboard: &clipboard,
            browser: &browser,
        };

        let err = lifecycle
            .login(
                &mut ctx,
                &login_request(Scope::root(), Scope::root()),
                &desktop,
            )
            .unwrap_err();

        assert!(matches!(err, CliError::Aborted));
        assert_eq!(ctx.store(), &before);
        assert!(!ctx.is_dirty());
    }

    #[test]
    fn test_narrowing_to_cwd_keeps_global_token() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        ctx.store_mut().set(Scope::root(), record("global"));
        let cwd = scope("/keyscope-test/project");

        let mut api = MockAuthApi::new();
        expect_code(&mut api);
        grant_on_first_poll(&mut api, "narrow");
        api.expect_revoke_auth_token().never();

        let mut prompter = MockPrompter::new();
        prompter.expect_select().times(1).returning(|_, _, _| Ok(0));

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, interactive()).with_host(host());
        let clipboard = RecordingClipboard::default();
        let browser = RecordingBrowser::default();
        let desktop = Desktop {
            prompter: &prompter,
            clipboard: &clipboard,
            browser: &browser,
        };

        let outcome = lifecycle
            .login(&mut ctx, &login_request(Scope::root(), cwd.clone()), &desktop)
            .unwrap();

        assert_eq!(outcome.scope, cwd);
        assert_eq!(outcome.previous_revoked, None);
        assert_eq!(ctx.store().get(&Scope::root()).unwrap().token, "global");
        assert_eq!(ctx.store().get(&cwd).unwrap().token, "narrow");
    }

    #[test]
    fn test_failed_revocation_does_not_fail_login() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let project = scope("/keyscope-test/project");
        ctx.store_mut().set(project.clone(), record("old"));

        let mut api = MockAuthApi::new();
        expect_code(&mut api);
        grant_on_first_poll(&mut api, "new");
        api.expect_revoke_auth_token().times(1).returning(|_, _| {
            Err(ApiError::Status {
                status: 401,
                message: "Invalid auth token".to_string(),
            })
        });

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let prompter = MockPrompter::new();
        let clipboard = RecordingClipboard::default();
        let browser = RecordingBrowser::default();
        let desktop = Desktop {
            prompter: &prompter,
            clipboard: &clipboard,
            browser: &browser,
        };

        let mut request = login_request(project.clone(), project.clone());
        request.overwrite = true;
        let outcome = lifecycle.login(&mut ctx, &request, &desktop).unwrap();

        assert_eq!(outcome.previous_revoked, Some(false));
        assert_eq!(ctx.store().get(&project).unwrap().token, "new");
        // headless runs never launch a browser
        assert!(browser.opened.borrow().is_empty());
    }

    #[test]
    fn test_denied_login_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);

        let mut api = MockAuthApi::new();
        expect_code(&mut api);
        api.expect_get_auth_token()
            .times(1)
            .returning(|_, _| Ok(TokenExchange::Denied("rejected".to_string())));

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let prompter = MockPrompter::new();
        let clipboard = RecordingClipboard::default();
        let browser = RecordingBrowser::default();
        let desktop = Desktop {
            prompter: &prompter,
            clipboard: &clipboard,
            browser: &browser,
        };

        let err = lifecycle
            .login(
                &mut ctx,
                &login_request(Scope::root(), Scope::root()),
                &desktop,
            )
            .unwrap_err();

        assert!(matches!(err, CliError::AuthorizationDenied(_)));
        assert!(ctx.store().is_empty());
        assert!(!ctx.path().exists());
    }

    #[test]
    fn test_browser_failure_falls_back_to_printing() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);

        let mut api = MockAuthApi::new();
        expect_code(&mut api);
        grant_on_first_poll(&mut api, "tok");

        let mut prompter = MockPrompter::new();
        prompter
            .expect_confirm()
            .withf(|prompt, default| prompt == "Open the authorization page in your browser?" && *default)
            .times(1)
            .returning(|_, _| Ok(true));

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, interactive()).with_host(host());
        let clipboard = RecordingClipboard::default();
        let browser = RecordingBrowser {
            fail: true,
            ..Default::default()
        };
        let desktop = Desktop {
            prompter: &prompter,
            clipboard: &clipboard,
            browser: &browser,
        };

        let mut request = login_request(Scope::root(), Scope::root());
        request.yes = false;
        request.copy_code = false;
        lifecycle.login(&mut ctx, &request, &desktop).unwrap();

        assert_eq!(browser.opened.borrow().len(), 1);
        assert!(clipboard.copied.borrow().is_empty());
    }

    #[test]
    fn test_roll_updates_every_scope_with_the_token() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let (a, b, c) = (
            scope("/keyscope-test/a"),
            scope("/keyscope-test/b"),
            scope("/keyscope-test/c"),
        );
        ctx.store_mut().set(a.clone(), record("T"));
        ctx.store_mut().set(b.clone(), record("T"));
        ctx.store_mut().set(c.clone(), record("U"));

        let mut api = MockAuthApi::new();
        api.expect_roll_auth_token()
            .withf(|endpoint, token| token == "T" && endpoint.host == "https://api.keyscope.dev")
            .times(1)
            .returning(|_, _| {
                Ok(RolledToken {
                    token: "T2".to_string(),
                })
            });

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let outcome = lifecycle.roll(&mut ctx, &a, true).unwrap();

        assert_eq!(outcome.token, "T2");
        assert_eq!(outcome.updated, vec![a.clone(), b.clone()]);
        assert_eq!(ctx.store().get(&a).unwrap().token, "T2");
        assert_eq!(ctx.store().get(&b).unwrap().token, "T2");
        assert_eq!(ctx.store().get(&c).unwrap().token, "U");

        let on_disk = crate::store::ScopeStore::load(ctx.path()).unwrap();
        assert_eq!(on_disk.get(&b).unwrap().token, "T2");
    }

    #[test]
    fn test_roll_hands_back_token_when_config_cannot_be_written() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let a = scope("/keyscope-test/a");
        ctx.store_mut().set(a.clone(), record("T"));
        // a directory where the config file should go makes the rename fail
        std::fs::create_dir_all(ctx.path()).unwrap();

        let mut api = MockAuthApi::new();
        api.expect_roll_auth_token().times(1).returning(|_, _| {
            Ok(RolledToken {
                token: "T2".to_string(),
            })
        });

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let err = lifecycle.roll(&mut ctx, &a, true).unwrap_err();

        assert_eq!(err.exit_code(), 1);
        match err {
            CliError::UnsavedToken { token, .. } => assert_eq!(token, "T2"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_interrupted_login_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let interrupt = Arc::new(AtomicBool::new(false));

        let mut api = MockAuthApi::new();
        expect_code(&mut api);
        let raise = Arc::clone(&interrupt);
        api.expect_get_auth_token().times(1).returning(move |_, _| {
            raise.store(true, Ordering::Relaxed);
            Ok(TokenExchange::Pending)
        });
        api.expect_revoke_auth_token().never();

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended())
            .with_host(host())
            .with_interrupt(&interrupt);
        let prompter = MockPrompter::new();
        let clipboard = RecordingClipboard::default();
        let browser = RecordingBrowser::default();
        let desktop = Desktop {
            prompter: &prompter,
            clipboard: &clipboard,
            browser: &browser,
        };

        let err = lifecycle
            .login(
                &mut ctx,
                &login_request(Scope::root(), Scope::root()),
                &desktop,
            )
            .unwrap_err();

        assert!(matches!(err, CliError::Interrupted));
        assert!(ctx.store().is_empty());
        assert!(!ctx.path().exists());
    }

    #[test]
    fn test_relogin_targets_host_of_replaced_token() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let project = scope("/keyscope-test/project");
        let mut previous = record("old");
        previous.api_host = "https://api.eu.keyscope.dev".to_string();
        ctx.store_mut().set(project.clone(), previous);

        let mut api = MockAuthApi::new();
        api.expect_generate_auth_code()
            .withf(|endpoint, _| endpoint.host == "https://api.eu.keyscope.dev")
            .times(1)
            .returning(|_, _| {
                Ok(AuthCode {
                    code: "ABCD-1234".to_string(),
                    auth_url: "https://dashboard.keyscope.dev/auth/cli".to_string(),
                })
            });
        grant_on_first_poll(&mut api, "new");
        api.expect_revoke_auth_token()
            .withf(|endpoint, token| {
                token == "old" && endpoint.host == "https://api.eu.keyscope.dev"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let prompter = MockPrompter::new();
        let clipboard = RecordingClipboard::default();
        let browser = RecordingBrowser::default();
        let desktop = Desktop {
            prompter: &prompter,
            clipboard: &clipboard,
            browser: &browser,
        };

        let mut request = login_request(project.clone(), project.clone());
        request.overwrite = true;
        lifecycle.login(&mut ctx, &request, &desktop).unwrap();

        let stored = ctx.store().get(&project).unwrap();
        assert_eq!(stored.token, "new");
        assert_eq!(stored.api_host, "https://api.eu.keyscope.dev");
    }

    #[test]
    fn test_roll_without_update_leaves_store() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let a = scope("/keyscope-test/a");
        ctx.store_mut().set(a.clone(), record("T"));
        ctx.persist().unwrap();

        let mut api = MockAuthApi::new();
        api.expect_roll_auth_token().times(1).returning(|_, _| {
            Ok(RolledToken {
                token: "T2".to_string(),
            })
        });

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let outcome = lifecycle.roll(&mut ctx, &a, false).unwrap();

        assert_eq!(outcome.token, "T2");
        assert!(outcome.updated.is_empty());
        assert_eq!(ctx.store().get(&a).unwrap().token, "T");
        assert!(!ctx.is_dirty());
    }

    #[test]
    fn test_roll_without_token_fails_before_remote_call() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);

        let mut api = MockAuthApi::new();
        api.expect_roll_auth_token().never();

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let err = lifecycle
            .roll(&mut ctx, &scope("/keyscope-test/a"), true)
            .unwrap_err();

        assert!(matches!(err, CliError::MissingValue("token")));
    }

    #[test]
    fn test_revoke_removes_only_matching_entries() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let (a, b) = (scope("/keyscope-test/a"), scope("/keyscope-test/b"));
        ctx.store_mut().set(a.clone(), record("T"));
        ctx.store_mut().set(b.clone(), record("U"));
        let binding = EnclaveConfig {
            project: Some("backend".to_string()),
            config: Some("dev".to_string()),
        };
        ctx.store_mut().set_enclave(a.clone(), binding.clone());
        ctx.store_mut().set_enclave(b.clone(), binding.clone());

        let mut api = MockAuthApi::new();
        api.expect_revoke_auth_token()
            .withf(|_, token| token == "T")
            .times(1)
            .returning(|_, _| Ok(()));

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let options = RevokeOptions {
            update_config: true,
            update_enclave_config: true,
            force: false,
        };
        let outcome = lifecycle.revoke(&mut ctx, &a, options).unwrap();

        assert_eq!(outcome.removed, vec![a.clone()]);
        assert_eq!(outcome.cleared_enclave, vec![a.clone()]);
        assert!(ctx.store().get(&a).is_none());
        assert_eq!(ctx.store().get(&b).unwrap().token, "U");
        assert_eq!(ctx.store().enclave(&b), Some(&binding));
    }

    #[test]
    fn test_revoke_can_keep_enclave_config() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let a = scope("/keyscope-test/a");
        ctx.store_mut().set(a.clone(), record("T"));
        ctx.store_mut().set_enclave(
            a.clone(),
            EnclaveConfig {
                project: Some("backend".to_string()),
                config: None,
            },
        );

        let mut api = MockAuthApi::new();
        api.expect_revoke_auth_token().times(1).returning(|_, _| Ok(()));

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let options = RevokeOptions {
            update_config: true,
            update_enclave_config: false,
            force: false,
        };
        let outcome = lifecycle.revoke(&mut ctx, &a, options).unwrap();

        assert_eq!(outcome.removed, vec![a.clone()]);
        assert!(outcome.cleared_enclave.is_empty());
        assert!(ctx.store().enclave(&a).is_some());
    }

    #[test]
    fn test_revoke_remote_failure_keeps_local_without_force() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let a = scope("/keyscope-test/a");
        ctx.store_mut().set(a.clone(), record("T"));
        ctx.persist().unwrap();

        let mut api = MockAuthApi::new();
        api.expect_revoke_auth_token().times(1).returning(|_, _| {
            Err(ApiError::Status {
                status: 401,
                message: "Token already revoked".to_string(),
            })
        });

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let options = RevokeOptions {
            update_config: true,
            update_enclave_config: true,
            force: false,
        };
        let err = lifecycle.revoke(&mut ctx, &a, options).unwrap_err();

        assert_eq!(err.to_string(), "Token already revoked");
        assert!(ctx.store().get(&a).is_some());
    }

    #[test]
    fn test_revoke_remote_failure_with_force_cleans_locally() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        let a = scope("/keyscope-test/a");
        ctx.store_mut().set(a.clone(), record("T"));
        ctx.persist().unwrap();

        let mut api = MockAuthApi::new();
        api.expect_revoke_auth_token().times(1).returning(|_, _| {
            Err(ApiError::Status {
                status: 401,
                message: "Token already revoked".to_string(),
            })
        });

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let options = RevokeOptions {
            update_config: true,
            update_enclave_config: true,
            force: true,
        };
        let err = lifecycle.revoke(&mut ctx, &a, options).unwrap_err();

        assert_eq!(err.to_string(), "Token already revoked");
        assert!(ctx.store().get(&a).is_none());
        let on_disk = crate::store::ScopeStore::load(ctx.path()).unwrap();
        assert!(on_disk.is_empty());
    }

    #[test]
    fn test_explicit_host_overrides_stored_host() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_in(dir.path());
        settings.api_host = "https://api.staging".to_string();
        settings.api_host_override = true;
        let mut ctx = ConfigContext::load(settings).unwrap();
        let a = scope("/keyscope-test/a");
        ctx.store_mut().set(a.clone(), record("T"));

        let mut api = MockAuthApi::new();
        api.expect_revoke_auth_token()
            .withf(|endpoint, _| endpoint.host == "https://api.staging" && endpoint.verify_tls)
            .times(1)
            .returning(|_, _| Ok(()));

        let clock = VirtualClock::new();
        let lifecycle = TokenLifecycle::new(&api, &clock, unattended()).with_host(host());
        let options = RevokeOptions {
            update_config: false,
            update_enclave_config: false,
            force: false,
        };
        let outcome = lifecycle.revoke(&mut ctx, &a, options).unwrap();
        assert!(outcome.removed.is_empty());
        assert!(ctx.store().get(&a).is_some());
    }
}
