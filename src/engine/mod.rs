pub mod cursor;
pub mod grouper;
pub mod groupby;
pub mod topn;
pub mod timeseries;
pub mod search;
pub mod time_boundary;
pub mod metadata;
pub mod select;

#[cfg(test)]
pub mod testing;

pub use groupby::GroupByEngine;
pub use metadata::SegmentMetadataEngine;
pub use search::SearchEngine;
pub use select::SelectEngine;
pub use time_boundary::TimeBoundaryEngine;
pub use timeseries::TimeSeriesEngine;
pub use topn::TopNEngine;

use crate::query::dispatcher::QueryEngine;

/// One engine per query family
pub fn default_engines() -> Vec<Box<dyn QueryEngine>> {
    vec![
        Box::new(GroupByEngine),
        Box::new(TopNEngine),
        Box::new(TimeSeriesEngine),
        Box::new(SearchEngine),
        Box::new(TimeBoundaryEngine),
        Box::new(SegmentMetadataEngine),
        Box::new(SelectEngine),
    ]
}
