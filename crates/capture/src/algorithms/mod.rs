pub mod assembly;
pub mod binarize;
pub mod dedup;
pub mod dust;
pub mod points;
pub mod skeleton;
pub mod trace;
pub mod words;

pub use assembly::{Assembly, LabelAssignment, PhylogenyAssembler, admissible, root_side, side_distance};
pub use binarize::{Binarizer, check_foreground, foreground_proportion, to_gray, too_much_foreground};
pub use dedup::{SegmentDeduplicator, distance_to_polyline};
pub use dust::{Cluster, DustFilter};
pub use points::{detect_branch_points, detect_end_points, reduce_points, remove_close_points};
pub use skeleton::ZhangSuenThinning;
pub use trace::PathTracer;
pub use words::{WordExtractor, tighten_rect};
