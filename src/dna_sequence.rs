use anyhow::{Result, anyhow};
use bio::io::fasta;
use gb_io::seq::Topology;
use std::{fs::File, ops::Range, path::Path};

/// A named sequence read from disk: a build target, a backbone, or a
/// database entry.
#[derive(Clone, Debug, PartialEq)]
pub struct DNAsequence {
    name: String,
    seq: String,
    circular: bool,
}

impl DNAsequence {
    pub fn new(name: &str, sequence: &str, circular: bool) -> Self {
        Self {
            name: name.to_string(),
            seq: Self::validate_dna_sequence(sequence),
            circular,
        }
    }

    /// Reads FASTA or GenBank, picked by file extension.
    pub fn from_file(filename: &str) -> Result<Vec<DNAsequence>> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let ret = match ext.as_str() {
            "gb" | "gbk" | "genbank" | "ape" => Self::from_genbank_file(filename)?,
            _ => Self::from_fasta_file(filename)?,
        };
        if ret.is_empty() {
            return Err(anyhow!("Could not parse any sequence from '{filename}'"));
        }
        Ok(ret)
    }

    /// A FASTA header mentioning "circular" marks the sequence as circular.
    pub fn from_fasta_file(filename: &str) -> Result<Vec<DNAsequence>> {
        let file = File::open(filename)?;
        fasta::Reader::new(file)
            .records()
            .map(|record| {
                let record = record?;
                let desc = record.desc().unwrap_or_default();
                let circular = record.id().to_ascii_lowercase().contains("circular")
                    || desc.to_ascii_lowercase().contains("circular");
                let seq = String::from_utf8_lossy(record.seq());
                Ok(DNAsequence::new(record.id(), &seq, circular))
            })
            .collect()
    }

    pub fn from_genbank_file(filename: &str) -> Result<Vec<DNAsequence>> {
        Ok(gb_io::reader::parse_file(filename)?
            .into_iter()
            .map(|seq| {
                let name = seq.name.clone().unwrap_or_else(|| filename.to_string());
                let text = String::from_utf8_lossy(&seq.seq);
                DNAsequence::new(&name, &text, seq.topology == Topology::Circular)
            })
            .collect())
    }

    /// Uppercases and drops everything that is not A, C, G or T.
    pub fn validate_dna_sequence(s: &str) -> String {
        s.chars()
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| matches!(c, 'A' | 'C' | 'G' | 'T'))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn forward(&self) -> &str {
        &self.seq
    }

    pub fn is_circular(&self) -> bool {
        self.circular
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Appends `other` to this sequence (insert + backbone).
    pub fn append(&mut self, other: &DNAsequence) {
        self.seq.push_str(&other.seq);
    }
}

pub fn letter_complement(letter: u8) -> u8 {
    match letter.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        _ => b'N',
    }
}

pub fn reverse_complement(seq: &str) -> String {
    seq.as_bytes()
        .iter()
        .rev()
        .map(|c| letter_complement(*c))
        .map(char::from)
        .collect()
}

/// Slice of a circular sequence. Coordinates may be negative or exceed the
/// sequence length; they are taken modulo the length. Returns `None` for an
/// empty sequence or a range longer than one revolution.
pub fn circular_range(seq: &str, range: Range<i64>) -> Option<String> {
    let len = seq.len() as i64;
    let Range { start, end } = range;
    if len == 0 || start > end || end - start > len {
        return None;
    }
    let bytes = seq.as_bytes();
    let ret = (start..end)
        .map(|i| bytes[i.rem_euclid(len) as usize])
        .collect::<Vec<u8>>();
    Some(String::from_utf8_lossy(&ret).to_string())
}

/// Start offsets of every exact occurrence of `needle` in `haystack`.
pub fn find_all_subsequences(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return vec![];
    }
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, w)| *w == needle)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_dna_sequence() {
        assert_eq!(DNAsequence::validate_dna_sequence("at gc\nNNxg"), "ATGCG");
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement("ATGC"), "GCAT");
        assert_eq!(reverse_complement("aacg"), "CGTT");
    }

    #[test]
    fn test_circular_range() {
        let seq = "ATGC";
        assert_eq!(circular_range(seq, 0..4), Some("ATGC".to_string()));
        assert_eq!(circular_range(seq, 4..8), Some("ATGC".to_string()));
        assert_eq!(circular_range(seq, 3..6), Some("CAT".to_string()));
        assert_eq!(circular_range(seq, -1..2), Some("CAT".to_string()));
        assert_eq!(circular_range(seq, 0..5), None);
        assert_eq!(circular_range("", 0..1), None);
    }

    #[test]
    fn test_find_all_subsequences() {
        assert_eq!(find_all_subsequences(b"ATATAT", b"ATA"), vec![0, 2]);
        assert!(find_all_subsequences(b"AT", b"ATA").is_empty());
    }

    #[test]
    fn test_fasta_circular_header() {
        let mut file = tempfile::Builder::new().suffix(".fa").tempfile().unwrap();
        writeln!(file, ">pSB1C3 circular plasmid\natgcatgc\nATGC\n>part linear\nGGGG").unwrap();
        let seqs = DNAsequence::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[0].name(), "pSB1C3");
        assert_eq!(seqs[0].forward(), "ATGCATGCATGC");
        assert!(seqs[0].is_circular());
        assert!(!seqs[1].is_circular());
    }

    #[test]
    fn test_genbank_topology() {
        let seq = gb_io::seq::Seq {
            name: Some("pTest".to_string()),
            topology: Topology::Circular,
            date: None,
            len: Some(12),
            molecule_type: Some("DNA".to_string()),
            division: String::new(),
            definition: None,
            accession: None,
            version: None,
            source: None,
            dblink: None,
            keywords: None,
            references: vec![],
            comments: vec![],
            seq: b"atgcatgcatgc".to_vec(),
            contig: None,
            features: vec![],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.gb");
        gb_io::writer::write(File::create(&path).unwrap(), &seq).unwrap();

        let seqs = DNAsequence::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(seqs[0].name(), "pTest");
        assert_eq!(seqs[0].forward(), "ATGCATGCATGC");
        assert!(seqs[0].is_circular());
    }
}
