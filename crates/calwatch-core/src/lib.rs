//! Core types: raw events, normalization, snapshot diffing, change rendering

pub mod diff;
pub mod error;
pub mod event;
pub mod format;
pub mod i18n;
pub mod normalize;
pub mod raw_event;
pub mod time;
pub mod tracing;

pub use diff::{ChangedField, DiffResult, ModifiedEvent, changed_fields, diff_snapshots};
pub use error::{CoreError, CoreResult};
pub use event::NormalizedEvent;
pub use format::{
    ChangeRenderer, EventFragment, FragmentLine, HtmlTemplate, LineKind, RenderedSections, Section,
    html_escape,
};
pub use i18n::{Catalog, DEFAULT_LANGUAGE, FieldLabels, Locale, TextOverrides, Texts};
pub use normalize::{normalize_event, normalize_snapshot, resolve_time};
pub use raw_event::{RawEvent, RawEventTime, Snapshot};
pub use time::{DatePattern, Localizer, localize_in};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
