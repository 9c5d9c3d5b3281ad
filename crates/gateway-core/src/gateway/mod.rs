pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod google_auth;
pub mod invoker;
pub mod normalize;
pub mod prompts;
pub mod routing;

pub use credentials::{CredentialResolver, ResolvedCredentials};
pub use dispatcher::{GatewayService, GenerationKind, GenerationRequest};
pub use error::{ErrorKind, GatewayError};
pub use google_auth::{
    AmbientIdentity, AmbientIdentityFuture, CloudAccessToken, GoogleDefaultIdentity,
    IdentityError,
};
pub use invoker::{UpstreamFailure, UpstreamInvoker, UpstreamReply};
pub use normalize::{CHAT_FALLBACK_REPLY, NormalizedResponse};
pub use routing::{AuthStyle, EndpointRouter, Operation, UpstreamTarget};
