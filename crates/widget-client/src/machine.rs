//! The widget's connection state machine.
//!
//! Pure bookkeeping with no I/O: the driver in [`crate::widget`] performs the
//! bootstrap and dial, reports the outcome here, and arms or clears its
//! reconnect timer according to what comes back.

use crate::backoff::ReconnectPolicy;
use crate::error::WidgetError;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// What started a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectTrigger {
    /// A press on the widget.
    User,
    /// The auto-connect option at startup.
    Startup,
    /// A reconnect timer firing.
    Reconnect,
}

/// What the driver should do after the machine entered `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterClose {
    /// Arm the (single) reconnect timer.
    Reconnect(Duration),
    /// Stay closed until the user acts.
    Stay,
    /// Reconnect attempts are exhausted.
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: ConnectionState,
    policy: ReconnectPolicy,
    trigger: Option<ConnectTrigger>,
    /// Reconnect attempts since the channel was last open.
    attempts: u32,
    reconnect: Option<Duration>,
}

impl SessionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Closed,
            policy,
            trigger: None,
            attempts: 0,
            reconnect: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The armed reconnect delay, if any.
    pub fn reconnect_timer(&self) -> Option<Duration> {
        self.reconnect
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `closed → connecting` for a user or startup trigger.
    ///
    /// Returns false when a connection is already in progress or open. Any
    /// armed reconnect timer is superseded.
    pub fn begin_connect(&mut self, trigger: ConnectTrigger) -> bool {
        if self.state != ConnectionState::Closed || trigger == ConnectTrigger::Reconnect {
            return false;
        }
        self.reconnect = None;
        self.attempts = 0;
        self.trigger = Some(trigger);
        self.state = ConnectionState::Connecting;
        true
    }

    /// The reconnect timer fired: `closed → connecting` if it is still armed.
    pub fn fire_reconnect(&mut self) -> bool {
        if self.state != ConnectionState::Closed || self.reconnect.take().is_none() {
            return false;
        }
        self.trigger = Some(ConnectTrigger::Reconnect);
        self.state = ConnectionState::Connecting;
        true
    }

    /// Bootstrap and dial succeeded.
    pub fn on_open(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Open;
            self.attempts = 0;
        }
    }

    /// Bootstrap or dial failed.
    ///
    /// A failed user or startup attempt is not retried. A failed reconnect
    /// attempt keeps backing off unless the agent no longer exists.
    pub fn on_connect_failed(&mut self, error: &WidgetError) -> AfterClose {
        if self.state != ConnectionState::Connecting {
            return AfterClose::Stay;
        }
        self.state = ConnectionState::Closed;
        match self.trigger {
            Some(ConnectTrigger::Reconnect) if error.is_retryable() => self.schedule_reconnect(),
            Some(ConnectTrigger::Reconnect) => {
                self.attempts = 0;
                AfterClose::GiveUp
            }
            _ => AfterClose::Stay,
        }
    }

    /// The relay closed the channel or it failed: `open → closed` and arm
    /// exactly one reconnect timer.
    pub fn on_remote_close(&mut self) -> AfterClose {
        if self.state != ConnectionState::Open {
            return AfterClose::Stay;
        }
        self.state = ConnectionState::Closed;
        self.schedule_reconnect()
    }

    /// Explicit user close from any state; suppresses reconnecting.
    pub fn on_user_close(&mut self) {
        self.state = ConnectionState::Closed;
        self.reconnect = None;
        self.attempts = 0;
        self.trigger = None;
    }

    fn schedule_reconnect(&mut self) -> AfterClose {
        self.attempts += 1;
        match self.policy.delay_for(self.attempts) {
            Some(delay) => {
                self.reconnect = Some(delay);
                AfterClose::Reconnect(delay)
            }
            None => {
                self.reconnect = None;
                self.attempts = 0;
                AfterClose::GiveUp
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> SessionMachine {
        SessionMachine::new(ReconnectPolicy::default())
    }

    fn open_machine() -> SessionMachine {
        let mut m = machine();
        assert!(m.begin_connect(ConnectTrigger::User));
        m.on_open();
        m
    }

    fn dropped() -> WidgetError {
        WidgetError::ConnectionFailed("refused".to_string())
    }

    #[test]
    fn test_connecting_to_open_only_after_success() {
        let mut m = machine();
        assert_eq!(m.state(), ConnectionState::Closed);

        m.on_open();
        assert_eq!(m.state(), ConnectionState::Closed);

        assert!(m.begin_connect(ConnectTrigger::Startup));
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(!m.begin_connect(ConnectTrigger::User));

        m.on_open();
        assert_eq!(m.state(), ConnectionState::Open);
    }

    #[test]
    fn test_user_close_suppresses_reconnect() {
        let mut m = open_machine();
        m.on_user_close();

        assert_eq!(m.state(), ConnectionState::Closed);
        assert_eq!(m.reconnect_timer(), None);
        assert!(!m.fire_reconnect());
    }

    #[test]
    fn test_remote_drop_arms_exactly_one_timer() {
        let mut m = open_machine();

        assert_eq!(
            m.on_remote_close(),
            AfterClose::Reconnect(Duration::from_secs(3))
        );
        assert_eq!(m.reconnect_timer(), Some(Duration::from_secs(3)));

        // A second close notification for the same drop does not re-arm.
        assert_eq!(m.on_remote_close(), AfterClose::Stay);
        assert_eq!(m.attempts(), 1);

        assert!(m.fire_reconnect());
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(m.reconnect_timer(), None);
        assert!(!m.fire_reconnect());
    }

    #[test]
    fn test_user_close_after_drop_cancels_timer() {
        let mut m = open_machine();
        m.on_remote_close();
        m.on_user_close();

        assert_eq!(m.reconnect_timer(), None);
        assert!(!m.fire_reconnect());
    }

    #[test]
    fn test_failed_user_connect_is_not_retried() {
        let mut m = machine();
        m.begin_connect(ConnectTrigger::User);

        assert_eq!(m.on_connect_failed(&dropped()), AfterClose::Stay);
        assert_eq!(m.state(), ConnectionState::Closed);
        assert_eq!(m.reconnect_timer(), None);
    }

    #[test]
    fn test_failed_reconnects_back_off_then_give_up() {
        let mut m = open_machine();
        let mut delays = vec![];

        let mut after = m.on_remote_close();
        while let AfterClose::Reconnect(delay) = after {
            delays.push(delay.as_secs());
            assert!(m.fire_reconnect());
            after = m.on_connect_failed(&dropped());
        }

        assert_eq!(delays, vec![3, 6, 12, 24, 30]);
        assert_eq!(after, AfterClose::GiveUp);
        assert_eq!(m.state(), ConnectionState::Closed);
        assert_eq!(m.reconnect_timer(), None);
    }

    #[test]
    fn test_successful_reconnect_resets_backoff() {
        let mut m = open_machine();
        m.on_remote_close();
        m.fire_reconnect();
        m.on_connect_failed(&dropped());
        m.fire_reconnect();
        m.on_open();
        assert_eq!(m.attempts(), 0);

        assert_eq!(
            m.on_remote_close(),
            AfterClose::Reconnect(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_not_found_during_reconnect_is_terminal() {
        let mut m = open_machine();
        m.on_remote_close();
        m.fire_reconnect();

        let after = m.on_connect_failed(&WidgetError::NotFound("demo-agent".to_string()));
        assert_eq!(after, AfterClose::GiveUp);
        assert_eq!(m.reconnect_timer(), None);
    }

    #[test]
    fn test_reconnect_trigger_cannot_be_forced() {
        let mut m = machine();
        assert!(!m.begin_connect(ConnectTrigger::Reconnect));
        assert!(!m.fire_reconnect());
    }
}
