pub mod consensus;
pub mod validator;

pub use consensus::config::ConsensusConfig;
pub use consensus::evaluator::{AgreementCluster, ClusterEvaluator};
pub use consensus::{ConsensusEngine, SubmitAck};
pub use validator::{ReportValidator, ValidationPolicy};
