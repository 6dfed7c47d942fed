//! Wire objects shared by the server, the admin API, and consumers.

pub mod delivery;
pub mod endpoint;
pub mod event;

pub use delivery::{
    AttemptLogResponse, AttemptStatus, DeliveryDetailResponse, DeliveryPage, DeliveryResponse,
    DeliveryStatus, ListDeliveriesQuery, RequeueResponse, clamp_limit,
};
pub use endpoint::{
    CreateEndpointRequest, CreateEndpointResponse, EndpointResponse, RotateSecretResponse,
    UpdateEndpointRequest,
};
pub use event::{EventKind, EventKindError, MAX_EVENT_KIND_LEN, MAX_EVENT_KINDS_PER_ENDPOINT};
