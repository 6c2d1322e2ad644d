use utoipa::OpenApi;

use crate::{api, layout};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health,
        api::api_status,
        api::analyze_layout,
        api::generate,
    ),
    components(
        schemas(
            api::FlyerRequest,
            api::HealthResponse,
            layout::FlyerForm,
            layout::LayoutData,
            layout::LayoutItem,
            layout::ItemKind,
            layout::Align,
        )
    ),
    tags(
        (name = "flowgen", description = "Flowgen flyer backend API")
    )
)]
pub struct ApiDoc;
