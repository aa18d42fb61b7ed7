pub mod residue_templates;

pub use residue_templates::{
    is_backbone_het_residue, is_polymer_residue, is_water, one_letter_code, residue_template,
    ResidueTemplate, ResidueType, UNKNOWN_ONE_LETTER_CODE, UNKNOWN_RESIDUE,
};
