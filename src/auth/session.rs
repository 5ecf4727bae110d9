use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use crate::api::{AuthApi, AuthCode, AuthGrant, Endpoint, HostInfo, TokenExchange};
use crate::error::{CliError, Result};

/// Wait between polls while the user is still authorizing
pub const POLL_INTERVAL: StdDuration = StdDuration::from_secs(2);

/// Hard ceiling on the whole exchange
pub const LOGIN_TIMEOUT_MINUTES: i64 = 5;

/// Source of time for the poller
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&self, duration: StdDuration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    CodeIssued,
    Polling,
    Completed,
    Denied,
    TimedOut,
    Failed,
}

impl SessionPhase {
    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Completed
                | SessionPhase::Denied
                | SessionPhase::TimedOut
                | SessionPhase::Failed
        )
    }
}

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    Completed(AuthGrant),
    Denied(String),
    TimedOut,
    Failed(CliError),
}

impl SessionOutcome {
    pub fn into_result(self) -> Result<AuthGrant> {
        match self {
            SessionOutcome::Completed(grant) => Ok(grant),
            SessionOutcome::Denied(message) => Err(CliError::AuthorizationDenied(message)),
            SessionOutcome::TimedOut => Err(CliError::LoginTimedOut(LOGIN_TIMEOUT_MINUTES)),
            SessionOutcome::Failed(err) => Err(err),
        }
    }
}

/// Device-code exchange with the remote API.
///
/// `Init -> CodeIssued -> Polling -> {Completed, Denied, TimedOut, Failed}`.
/// Lives only for the duration of one login.
pub struct AuthSession<'a> {
    api: &'a dyn AuthApi,
    clock: &'a dyn Clock,
    endpoint: Endpoint,
    interrupt: Option<&'a AtomicBool>,
    phase: SessionPhase,
    code: Option<AuthCode>,
    deadline: Option<DateTime<Utc>>,
    polls: u32,
}

impl<'a> AuthSession<'a> {
    pub fn new(api: &'a dyn AuthApi, clock: &'a dyn Clock, endpoint: Endpoint) -> Self {
        Self {
            api,
            clock,
            endpoint,
            interrupt: None,
            phase: SessionPhase::Init,
            code: None,
            deadline: None,
            polls: 0,
        }
    }

    /// Stop polling once `flag` is raised
    pub fn with_interrupt(mut self, flag: &'a AtomicBool) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The code shown to the user, once issued
    #[cfg(test)]
    pub fn code(&self) -> Option<&AuthCode> {
        self.code.as_ref()
    }

    #[cfg(test)]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Drive the session to a terminal phase.
    ///
    /// `present` shows the code to the user between issuing and polling; an
    /// error from it fails the session.
    pub fn run<F>(&mut self, host: &HostInfo, present: F) -> SessionOutcome
    where
        F: FnOnce(&AuthCode) -> Result<()>,
    {
        let code = match self.issue_code(host) {
            Ok(code) => code,
            Err(err) => return self.fail(err),
        };

        if let Err(err) = present(&code) {
            return self.fail(err);
        }
        self.phase = SessionPhase::Polling;

        self.poll()
    }

    fn issue_code(&mut self, host: &HostInfo) -> Result<AuthCode> {
        tracing::debug!("Requesting auth code from {}", self.endpoint.host);
        let code = self.api.generate_auth_code(&self.endpoint, host)?;

        self.deadline = Some(self.clock.now() + Duration::minutes(LOGIN_TIMEOUT_MINUTES));
        self.code = Some(code.clone());
        self.phase = SessionPhase::CodeIssued;
        Ok(code)
    }

    fn poll(&mut self) -> SessionOutcome {
        let (Some(code), Some(deadline)) = (self.code.clone(), self.deadline) else {
            return self.fail(CliError::ConfigError(
                "auth session polled before a code was issued".to_string(),
            ));
        };

        loop {
            if self.interrupted() {
                return self.fail(CliError::Interrupted);
            }
            if self.clock.now() > deadline {
                return self.time_out();
            }

            let response = self.api.get_auth_token(&self.endpoint, &code.code);
            self.polls += 1;

            // a response that lands after the deadline is discarded
            if self.clock.now() > deadline {
                return self.time_out();
            }

            match response {
                Ok(TokenExchange::Pending) => {
                    tracing::debug!("Authorization pending (poll {})", self.polls);
                    self.clock.sleep(POLL_INTERVAL);
                }
                Ok(TokenExchange::Granted(grant)) => {
                    tracing::debug!("Authorization completed after {} polls", self.polls);
                    self.phase = SessionPhase::Completed;
                    return SessionOutcome::Completed(grant);
                }
                Ok(TokenExchange::Denied(message)) => {
                    tracing::debug!("Authorization denied");
                    self.phase = SessionPhase::Denied;
                    return SessionOutcome::Denied(message);
                }
                Err(err) => return self.fail(err.into()),
            }
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn time_out(&mut self) -> SessionOutcome {
        tracing::debug!("Login deadline passed after {} polls", self.polls);
        self.phase = SessionPhase::TimedOut;
        SessionOutcome::TimedOut
    }

    fn fail(&mut self, err: CliError) -> SessionOutcome {
        self.phase = SessionPhase::Failed;
        SessionOutcome::Failed(err)
    }
}
