pub mod academic;
pub mod email;
pub mod payment;
pub mod resume;
pub mod stats;
pub mod user;

pub use email::{Company, GeneratedEmail, SendState, SendStatus};
pub use payment::PaymentStatus;
pub use resume::{ParseStatus, ResumeHandle};
pub use user::User;
