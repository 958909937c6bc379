//! Read-only analyses over operator trees.

mod hilbert;
mod term_index;

pub use hilbert::{
    HilbertSpace, HilbertSpaceDims, RegisterInformation, RegisterState, VerifyHilbertSpace,
    hilbert_space_dims, term_shapes,
};
pub use term_index::{Key, TermIndex, TermIndexRule, term_index, term_indices, terms};
