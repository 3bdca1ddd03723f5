pub mod attack;
pub mod config;
pub mod coordinator;
pub mod payloads;
pub mod state;
pub mod stream;

pub use attack::{AttackType, AttackTypeError};
pub use config::GeneratorConfig;
pub use coordinator::{DEFAULT_READ_TIMEOUT, GeneratorCoordinator, GeneratorError};
pub use payloads::{
    InlinePayloadLoader, PayloadError, PayloadLists, PayloadLoader, PayloadSpec, PayloadSpecs,
};
pub use state::{KeySnapshot, Phase};
pub use stream::{Binding, PayloadStream, Pull, StreamProducer, StreamSink};
