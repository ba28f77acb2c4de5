//! Waking approvers.
//!
//! The registry only knows opaque [`EndpointHandle`]s. An
//! [`ApproverNotifier`] turns a handle into a liveness probe and a wake-up.
//! Two transports ship here: [`SignalNotifier`] sends `SIGUSR1` to the
//! approver process, and [`ChannelNotifier`] delivers the request id over an
//! in-process channel.

use dashmap::DashMap;
use std::fmt;
use tokio::sync::mpsc;

use crate::error::{ApprovalError, ApprovalResult};
use crate::pending::RequestId;
use crate::registry::EndpointHandle;

/// Transport used to probe and wake approvers.
pub trait ApproverNotifier: Send + Sync {
    /// Whether the approver behind `handle` can still be woken.
    fn is_alive(&self, handle: EndpointHandle) -> bool;

    /// Wake the approver behind `handle` about request `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Notify`] if the wake-up could not be sent.
    fn notify(&self, handle: EndpointHandle, id: RequestId) -> ApprovalResult<()>;
}

/// Wakes approver processes with `SIGUSR1`.
///
/// The handle is the approver's pid. The signal carries no payload; a woken
/// approver lists its pending requests to find the new one.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalNotifier;

#[cfg(unix)]
impl SignalNotifier {
    /// Create a signal notifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn pid(handle: EndpointHandle) -> Option<nix::unistd::Pid> {
        // pid 0 and anything past i32::MAX would address process groups.
        i32::try_from(handle.0)
            .ok()
            .filter(|pid| *pid > 0)
            .map(nix::unistd::Pid::from_raw)
    }
}

#[cfg(unix)]
impl ApproverNotifier for SignalNotifier {
    fn is_alive(&self, handle: EndpointHandle) -> bool {
        use nix::errno::Errno;

        let Some(pid) = Self::pid(handle) else {
            return false;
        };
        match nix::sys::signal::kill(pid, None) {
            // EPERM: the process exists but belongs to someone else.
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn notify(&self, handle: EndpointHandle, id: RequestId) -> ApprovalResult<()> {
        let pid = Self::pid(handle).ok_or_else(|| ApprovalError::Notify {
            handle,
            reason: "not a valid process id".to_owned(),
        })?;
        nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGUSR1).map_err(|e| {
            ApprovalError::Notify {
                handle,
                reason: e.to_string(),
            }
        })?;
        tracing::debug!(%handle, request_id = %id, "approver signalled");
        Ok(())
    }
}

/// Delivers request ids to in-process approvers.
///
/// Each connected handle owns an unbounded receiver; an endpoint is alive
/// while its receiver is held.
#[derive(Default)]
pub struct ChannelNotifier {
    senders: DashMap<EndpointHandle, mpsc::UnboundedSender<RequestId>>,
}

impl ChannelNotifier {
    /// Create a notifier with no connected endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `handle`, returning the receiver its approver listens on.
    ///
    /// Connecting an already connected handle replaces the old channel.
    pub fn connect(&self, handle: EndpointHandle) -> mpsc::UnboundedReceiver<RequestId> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(handle, tx);
        rx
    }

    /// Disconnect `handle`. Returns whether it was connected.
    pub fn disconnect(&self, handle: EndpointHandle) -> bool {
        self.senders.remove(&handle).is_some()
    }
}

impl ApproverNotifier for ChannelNotifier {
    fn is_alive(&self, handle: EndpointHandle) -> bool {
        self.senders
            .get(&handle)
            .is_some_and(|tx| !tx.is_closed())
    }

    fn notify(&self, handle: EndpointHandle, id: RequestId) -> ApprovalResult<()> {
        let sender = self.senders.get(&handle).ok_or_else(|| ApprovalError::Notify {
            handle,
            reason: "not connected".to_owned(),
        })?;
        sender.send(id).map_err(|_| ApprovalError::Notify {
            handle,
            reason: "receiver dropped".to_owned(),
        })
    }
}

impl fmt::Debug for ChannelNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelNotifier")
            .field("connected", &self.senders.len())
            .finish()
    }
}
