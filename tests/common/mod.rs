#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};

pub use recipe_agent_test_utils::builders::{ConfigBuilder, RecipeBuilder};
pub use recipe_agent_test_utils::fake_lifecycle::{FakeProcessControl, ScriptedPrompt};
pub use recipe_agent_test_utils::fake_pool::FakeWorkerPool;
pub use recipe_agent_test_utils::{init_tracing, wait_until, with_timeout};

/// A fixed, minute-aligned instant on 2026-03-02.
pub fn at(hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, min, 0).unwrap()
}
