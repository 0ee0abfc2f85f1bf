mod driver;

pub use driver::{BufferedCursor, DatabaseDriver, Execution, Outcome, PreparedStatement, RowCursor};
