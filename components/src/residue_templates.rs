use std::collections::HashMap;
use std::sync::OnceLock;

/// Three letter code of the placeholder for a residue of unknown type.
pub const UNKNOWN_RESIDUE: &str = "UNK";
/// One letter code used for any residue without a standard one letter code.
pub const UNKNOWN_ONE_LETTER_CODE: char = 'X';

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ResidueType {
    NonPolymer,
    Peptide,
    DNA,
    RNA,
    Unsupported,
}

#[derive(Debug)]
pub struct ResidueTemplate {
    pub residue_type: ResidueType,
    pub one_letter_code: char,
}

// (name, type, one letter code)
const STANDARD_RESIDUES: [(&str, ResidueType, char); 30] = [
    ("ALA", ResidueType::Peptide, 'A'),
    ("ARG", ResidueType::Peptide, 'R'),
    ("ASN", ResidueType::Peptide, 'N'),
    ("ASP", ResidueType::Peptide, 'D'),
    ("CYS", ResidueType::Peptide, 'C'),
    ("GLN", ResidueType::Peptide, 'Q'),
    ("GLU", ResidueType::Peptide, 'E'),
    ("GLY", ResidueType::Peptide, 'G'),
    ("HIS", ResidueType::Peptide, 'H'),
    ("ILE", ResidueType::Peptide, 'I'),
    ("LEU", ResidueType::Peptide, 'L'),
    ("LYS", ResidueType::Peptide, 'K'),
    ("MET", ResidueType::Peptide, 'M'),
    ("PHE", ResidueType::Peptide, 'F'),
    ("PRO", ResidueType::Peptide, 'P'),
    ("SER", ResidueType::Peptide, 'S'),
    ("THR", ResidueType::Peptide, 'T'),
    ("TRP", ResidueType::Peptide, 'W'),
    ("TYR", ResidueType::Peptide, 'Y'),
    ("VAL", ResidueType::Peptide, 'V'),
    ("A", ResidueType::RNA, 'A'),
    ("C", ResidueType::RNA, 'C'),
    ("G", ResidueType::RNA, 'G'),
    ("U", ResidueType::RNA, 'U'),
    ("T", ResidueType::RNA, 'T'),
    ("DA", ResidueType::DNA, 'A'),
    ("DC", ResidueType::DNA, 'C'),
    ("DG", ResidueType::DNA, 'G'),
    ("DU", ResidueType::DNA, 'U'),
    ("DT", ResidueType::DNA, 'T'),
];

/// Non standard residues that are commonly found within a peptide chain
/// and are recorded as HETATM.
const BACKBONE_HET_RESIDUES: [&str; 16] = [
    "ACE", "NH2", "SUI", "PYR", "GL3", "MSE", "SNN", "CRO", "AKZ", "GLK", "LLP", "NLE", "SMC",
    "AIB", "ABA", "L2O",
];

const WATER_RESIDUES: [&str; 2] = ["HOH", "DOD"];

pub fn get_residue_templates() -> HashMap<&'static str, ResidueTemplate> {
    let mut templates: HashMap<&'static str, ResidueTemplate> = STANDARD_RESIDUES
        .iter()
        .map(|&(name, residue_type, one_letter_code)| {
            (
                name,
                ResidueTemplate {
                    residue_type,
                    one_letter_code,
                },
            )
        })
        .collect();
    templates.insert(
        UNKNOWN_RESIDUE,
        ResidueTemplate {
            residue_type: ResidueType::Unsupported,
            one_letter_code: UNKNOWN_ONE_LETTER_CODE,
        },
    );
    templates
}

fn templates() -> &'static HashMap<&'static str, ResidueTemplate> {
    static TEMPLATES: OnceLock<HashMap<&'static str, ResidueTemplate>> = OnceLock::new();
    TEMPLATES.get_or_init(get_residue_templates)
}

/// The template of a standard residue, or of the unknown residue placeholder.
///
/// Returns `None` for any other residue, including modified residues that
/// usually belong to a polymer.
pub fn residue_template(name: &str) -> Option<&'static ResidueTemplate> {
    templates().get(name.trim())
}

/// Is the residue a standard amino acid, a standard nucleotide,
/// or the unknown residue placeholder?
pub fn is_polymer_residue(name: &str) -> bool {
    residue_template(name).is_some()
}

pub fn one_letter_code(name: &str) -> char {
    residue_template(name)
        .map(|template| template.one_letter_code)
        .unwrap_or(UNKNOWN_ONE_LETTER_CODE)
}

pub fn is_backbone_het_residue(name: &str) -> bool {
    BACKBONE_HET_RESIDUES.contains(&name.trim())
}

pub fn is_water(name: &str) -> bool {
    WATER_RESIDUES.contains(&name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ALA", Some(ResidueType::Peptide))]
    #[case("DA", Some(ResidueType::DNA))]
    #[case("U", Some(ResidueType::RNA))]
    #[case(" G ", Some(ResidueType::RNA))]
    #[case("UNK", Some(ResidueType::Unsupported))]
    #[case("MSE", None)]
    #[case("HEM", None)]
    fn test_residue_type(#[case] name: &str, #[case] expected: Option<ResidueType>) {
        let residue_type = residue_template(name).map(|template| template.residue_type);
        assert_eq!(residue_type, expected);
    }

    #[rstest]
    #[case("TRP", 'W')]
    #[case("DT", 'T')]
    #[case("UNK", 'X')]
    #[case("MSE", 'X')]
    fn test_one_letter_code(#[case] name: &str, #[case] expected: char) {
        assert_eq!(one_letter_code(name), expected);
    }

    #[test]
    fn test_polymer_residues() {
        assert!(is_polymer_residue("GLY"));
        assert!(is_polymer_residue("UNK"));
        assert!(!is_polymer_residue("HOH"));
        assert!(!is_polymer_residue("ACE"));
    }

    #[test]
    fn test_backbone_het_and_water() {
        assert!(is_backbone_het_residue("MSE"));
        assert!(!is_backbone_het_residue("HEM"));
        assert!(is_water("HOH"));
        assert!(is_water("DOD"));
        assert!(!is_water("ALA"));
    }
}
