//! UseCase layer
//!
//! ビジネスロジックを実装します。コラボレーションセッションの全操作は
//! [`SessionOrchestrator`] に集約され、UI 層（HTTP ゲートウェイ）と
//! スイーパーから共有されます。

pub mod orchestrator;

pub use orchestrator::{
    CreateSessionInput, DEFAULT_SWEEP_INTERVAL, OrchestratorSettings, SessionOrchestrator,
    SweepReport, Sweeper,
};
