// Each subcommand lives in its own module.

pub mod add;
pub mod done;
pub mod list;
pub mod mark;
pub mod preview;
pub mod review;
pub mod streak;
