pub mod allele;
pub mod annotation;
pub mod model;
pub mod record;

pub use allele::{Allele, AssignedAllele, COMMON_ALLELE};
pub use annotation::{parse_annotation, parse_annotation_list, ParsedAnnotation, ANNOTATION_SEPARATOR};
pub use model::{LocusTemplate, MutationModel};
pub use record::{Mutation, MutationKind, NaKind};
