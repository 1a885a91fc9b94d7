//! Packaging handoff: the external tool seam, the artifact poll and the
//! protected game files a pass restores first.

mod handoff;
mod restore;
mod tool;

pub use handoff::{
    DEFAULT_OUTPUT_NAME, DEFAULT_POLL_TIMEOUT, DEFAULT_TOOL_ID, HandoffOptions, POLL_INTERVAL,
    handoff,
};
pub use restore::{OriginalFiles, PROTECTED_FILES, RestoreReport};
pub use tool::{PackTool, ProcessPackTool, ToolInvocation, ToolOutput};

#[cfg(test)]
pub use tool::MockPackTool;
