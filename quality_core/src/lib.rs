//! Core of the quality map viewer.
//!
//! Loads the map layers behind a join barrier, colors features by their
//! quality value, tracks the user's area/topic/dataset selection and turns it
//! into report requests whose results are rendered for display and export.

pub mod color_scale;
pub mod export;
pub mod layer_loader;
pub mod layers;
pub mod lifecycle;
pub mod log_stream;
pub mod render;
pub mod report_client;
pub mod selection;
pub mod session;
pub mod topics;
pub mod viewer_config;

pub use color_scale::{
    ColorScale, ColorScaleError, ColorStop, Fill, PatternFill, QualityValue, Rgb,
    DEFAULT_NO_DATA_SENTINEL,
};
pub use export::{export_markdown, write_export, ExportError};
pub use layer_loader::{
    load_layers, load_layers_with, FetchError, LayerSource, LayerSpec, LoadFailure, LoadedLayer,
    LoadedLayers,
};
pub use layers::{
    FeatureClick, FeatureKey, FeatureStyle, InfoPanel, LayerManager, MapFeature, MapLayer,
    PropertyKeys, DEFAULT_INFO_MESSAGE,
};
pub use lifecycle::{CancelToken, InFlightGuard, LifecycleFlag, RequestLifecycle};
pub use log_stream::{LogEnvelope, LogForwardLayer};
pub use render::{
    render, render_text, IndicatorEntry, RenderedReport, ReportSection, ReportStatus, ReportView,
};
pub use report_client::{
    CompletedReport, PendingReport, ReportClient, ReportFetchFailure, ReportRequest, ReportSource,
    SubmitError, DEFAULT_REPORT_TIMEOUT,
};
pub use selection::{
    enablement, AreaRef, CompositeIdError, DatasetRef, Enablement, SelectionEvent,
    SelectionState, SubmitColor, TopicRef, ValidationFailure,
};
pub use session::{UserEvent, ViewFlags, ViewerSession};
pub use topics::{default_topics, TopicCatalogue, TopicOption, PLACEHOLDER_TOPIC};
pub use viewer_config::{
    default_fallback_polygon, load_viewer_config_from_env, ColorScaleConfig, ReportConfig,
    ViewerConfig, ViewerConfigError, BUILTIN_VIEWER_CONFIG, VIEWER_CONFIG_ENV,
};
