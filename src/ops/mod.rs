//! Operator-facing glue: producer-side output edges and consumer-side
//! scheduling terms.

mod output;
pub use output::{Output, OutputStream, OutputTuple, Outputs};

mod reader;
pub use reader::{AnyChannelReader, ChannelReader, SchedulingTerm};
