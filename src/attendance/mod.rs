pub mod clock;
pub mod machine;
pub mod session;
pub mod state;

pub use clock::{Clock, FixedClock, SystemClock};
pub use machine::{AttendanceMachine, CheckInOutcome, DayStatus};
pub use session::{PageSession, SessionRegistry};
pub use state::{AttendanceState, AttendanceView, LocatedFix, LocationState, LocationView};
