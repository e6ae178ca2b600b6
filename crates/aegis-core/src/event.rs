//! Events: passive, immutable facts fed into a state machine.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A fact describing something that happened.
///
/// Events are passive data. They carry an identifier (for correlation in
/// logs), a kind tag (the coarse event family, used by resolvers and
/// telemetry), and the instant they were created. Resolvers consume them;
/// they never carry behavior.
pub trait StateMachineEvent: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Unique id of this event instance.
    fn id(&self) -> Uuid;

    /// Coarse tag naming the event family, e.g. `"srpSignIn.initiateSrp"`.
    fn kind(&self) -> &'static str;

    /// When the event was created.
    fn time(&self) -> DateTime<Utc>;
}
