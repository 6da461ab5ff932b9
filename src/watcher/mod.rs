pub mod clock;
pub mod events;
pub mod runner;
pub mod stats;
pub mod subscription;
pub mod supervisor;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventBus, EventSink, WatchEvent};
pub use runner::{spawn, WatcherHandle};
pub use stats::{Statistics, StatisticsReport};
pub use subscription::{ChangeNotifier, ChangeTrigger, FsNotifier, Subscription};
pub use supervisor::{Phase, WatchContext, WatchError, WatchSupervisor};
