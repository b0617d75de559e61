use crate::{
    config::AssemblyParameters,
    dna_sequence::{circular_range, find_all_subsequences, reverse_complement},
    error::{PrimerError, ToolError},
    frag::{Frag, FragKey},
    hairpin::PRIMER3_ENV_CONFIG,
    tool::{run_tool, tool_executable},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    io::Write,
};

const DEFAULT_PRIMER3_BIN: &str = "primer3_core";
pub const PRIMER3_ENV_BIN: &str = "GIBSON_PRIMER3_BIN";

/// primer3 cannot design primers longer than 36bp; homology that would push
/// them past this is appended after design instead.
const MAX_GROWN_PRIMER: usize = 6;
/// Larger differences between the homology added on each side are appended
/// after design so both primers keep a similar annealing temperature.
const MAX_HOMOLOGY_IMBALANCE: usize = 5;
/// 3' bases a primer needs to match for a site to count as a binding site.
const OFF_TARGET_SEED: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primer {
    pub seq: String,
    /// `true` for the forward (left) primer.
    pub strand: bool,
    pub penalty: f64,
    pub pair_penalty: f64,
    pub tm: f64,
    pub gc: f64,
    /// Inclusive target coordinates covered by the primer, including any
    /// homology it adds.
    pub range: (i64, i64),
}

impl Primer {
    pub fn new(seq: String) -> Self {
        Self {
            seq,
            strand: true,
            penalty: 0.0,
            pair_penalty: 0.0,
            tm: 0.0,
            gc: 0.0,
            range: (0, 0),
        }
    }
}

/// Designs a primer pair that amplifies `frag` and adds the homology it
/// needs to anneal to `last` and `next`. The forward primer's range starts
/// the PCR product and the reverse primer's range ends it.
pub trait PrimerDesigner {
    fn design(
        &self,
        last: &Frag,
        frag: &Frag,
        next: &Frag,
        target: &str,
        params: &AssemblyParameters,
    ) -> Result<[Primer; 2], PrimerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PrimerKey {
    frag: FragKey,
    last_end: i64,
    start: i64,
    end: i64,
    next_start: i64,
}

impl PrimerKey {
    fn new(last: &Frag, f: &Frag, next: &Frag) -> Self {
        Self {
            frag: f.key.clone(),
            last_end: last.end,
            start: f.start,
            end: f.end,
            next_start: next.start,
        }
    }
}

/// Designs and rejections from earlier in the same planning run, keyed by
/// the fragment and its neighbours' positions. Tool failures are never
/// remembered.
#[derive(Debug, Default)]
pub struct PrimerCache {
    made: HashMap<PrimerKey, [Primer; 2]>,
    failed: HashMap<PrimerKey, PrimerError>,
    hits: usize,
}

impl PrimerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn design(
        &mut self,
        designer: &dyn PrimerDesigner,
        last: &Frag,
        f: &Frag,
        next: &Frag,
        target: &str,
        params: &AssemblyParameters,
    ) -> Result<[Primer; 2], PrimerError> {
        let key = PrimerKey::new(last, f, next);
        if let Some(primers) = self.made.get(&key) {
            self.hits += 1;
            return Ok(primers.clone());
        }
        if let Some(err) = self.failed.get(&key) {
            self.hits += 1;
            return Err(err.clone());
        }

        match designer.design(last, f, next, target, params) {
            Ok(primers) => {
                self.made.insert(key, primers.clone());
                Ok(primers)
            }
            Err(err) => {
                if !err.is_tool_failure() {
                    self.failed.insert(key, err.clone());
                }
                Err(err)
            }
        }
    }

    /// Requests answered without asking the designer.
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.made.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trims the end of `f` when it overlaps `next` by more than `max_homology`,
/// unless that would leave it shorter than `min_length`.
pub fn shrink(f: &mut Frag, next: &Frag, max_homology: usize, min_length: usize) {
    let dist = f.distance_to(next);
    if dist >= -(max_homology as i64) {
        return;
    }
    let shift = -dist - max_homology as i64;
    if f.end - shift - f.start > min_length as i64 && f.seq.len() as i64 > shift {
        f.end -= shift;
        f.seq.truncate(f.seq.len() - shift as usize);
    }
}

/// bp the primer on `left`'s end has to add to make a junction with `right`:
/// any gap plus half the minimum homology. Nothing when the two already
/// overlap enough or are too far apart to bridge by PCR.
pub fn bp_to_add(left: &Frag, right: &Frag, params: &AssemblyParameters) -> usize {
    if !left.overlaps_via_pcr(right, params) || left.overlaps_via_homology(right, params) {
        return 0;
    }
    let gap = (left.distance_to(right) + 1).max(0) as usize;
    gap + params.min_homology.div_ceil(2)
}

/// Room primer3 is given to move a primer inwards, given the distance to
/// the neighbouring fragment.
pub fn buffer(dist: i64, params: &AssemblyParameters) -> usize {
    let min_homology = params.min_homology as i64;
    if dist > params.pcr_max_embed_length {
        return params.pcr_buffer_length;
    }
    if dist < -min_homology {
        return ((-dist - min_homology) / 2) as usize;
    }
    0
}

/// Melting temperature by the Wallace rule: 2°C per A/T, 4°C per G/C.
pub fn wallace_tm(seq: &str) -> f64 {
    seq.bytes()
        .map(|b| match b.to_ascii_uppercase() {
            b'G' | b'C' => 4.0,
            b'A' | b'T' => 2.0,
            _ => 0.0,
        })
        .sum()
}

/// The first binding site of `primer` in `template`, other than its
/// intended (longest) one, that would anneal above `max_tm`. Sites must
/// match the primer's 3' end; both strands are searched.
pub fn off_target_site(primer: &str, template: &str, max_tm: f64) -> Option<String> {
    let primer = primer.to_ascii_uppercase().into_bytes();
    if primer.len() < OFF_TARGET_SEED {
        return None;
    }
    let seed = &primer[primer.len() - OFF_TARGET_SEED..];

    let forward = template.to_ascii_uppercase();
    let strands = [reverse_complement(&forward), forward];
    let mut sites: Vec<String> = vec![];
    for strand in &strands {
        let bytes = strand.as_bytes();
        for pos in find_all_subsequences(bytes, seed) {
            let site_end = pos + OFF_TARGET_SEED;
            let mut matched = OFF_TARGET_SEED;
            while matched < primer.len()
                && matched < site_end
                && bytes[site_end - matched - 1] == primer[primer.len() - matched - 1]
            {
                matched += 1;
            }
            sites.push(String::from_utf8_lossy(&bytes[site_end - matched..site_end]).to_string());
        }
    }

    let intended = sites
        .iter()
        .enumerate()
        .max_by(|(i, a), (j, b)| a.len().cmp(&b.len()).then(j.cmp(i)))
        .map(|(i, _)| i)?;
    sites
        .into_iter()
        .enumerate()
        .find(|(i, site)| *i != intended && wallace_tm(site) > max_tm)
        .map(|(_, site)| site)
}

/// Where primer3 should place the primers, and the homology to append to
/// them afterwards.
#[derive(Debug, Clone, PartialEq)]
struct PrimerWindow {
    start: i64,
    length: i64,
    grow: usize,
    add_left: usize,
    add_right: usize,
}

impl PrimerWindow {
    fn new(f: &Frag, add_left: usize, add_right: usize) -> Self {
        let grow = add_left.max(add_right);
        if add_left.abs_diff(add_right) > MAX_HOMOLOGY_IMBALANCE || grow > MAX_GROWN_PRIMER {
            return Self {
                start: f.start,
                length: f.end - f.start + 1,
                grow: 0,
                add_left,
                add_right,
            };
        }
        let start = f.start - add_left as i64;
        Self {
            start,
            length: f.end - start + 1 + add_right as i64,
            grow,
            add_left: 0,
            add_right: 0,
        }
    }
}

/// Primer design through primer3's `primer3_core`.
#[derive(Debug, Clone)]
pub struct Primer3Designer {
    executable: String,
    config_dir: Option<String>,
}

impl Default for Primer3Designer {
    fn default() -> Self {
        Self {
            executable: tool_executable(PRIMER3_ENV_BIN, DEFAULT_PRIMER3_BIN),
            config_dir: std::env::var(PRIMER3_ENV_CONFIG)
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}

impl Primer3Designer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executable(executable: &str) -> Self {
        Self {
            executable: executable.to_string(),
            ..Self::default()
        }
    }

    /// Boulder-IO input for primer3. The template is the target repeated
    /// four times and target coordinates are offset by one revolution, so
    /// windows crossing the origin stay contiguous.
    fn settings(
        &self,
        id: &str,
        target: &str,
        window: &PrimerWindow,
        left_buffer: usize,
        right_buffer: usize,
        params: &AssemblyParameters,
    ) -> Result<String, PrimerError> {
        let offset = target.len() as i64;
        let start = window.start + offset;
        let length = window.length;
        let primer_min = 18 + window.grow;
        let primer_opt = 20 + window.grow;
        let primer_max = 30 + window.grow;

        let mut settings: BTreeMap<&str, String> = BTreeMap::new();
        settings.insert("SEQUENCE_ID", id.to_string());
        settings.insert("SEQUENCE_TEMPLATE", target.repeat(4));
        settings.insert("PRIMER_NUM_RETURN", "1".to_string());
        settings.insert("PRIMER_PICK_ANYWAY", "1".to_string());
        settings.insert("PRIMER_EXPLAIN_FLAG", "1".to_string());
        settings.insert("PRIMER_MIN_SIZE", primer_min.to_string());
        settings.insert("PRIMER_OPT_SIZE", primer_opt.to_string());
        settings.insert("PRIMER_MAX_SIZE", primer_max.to_string());
        settings.insert("PRIMER_MIN_TM", "47.0".to_string());
        settings.insert("PRIMER_MAX_TM", "73.0".to_string());
        settings.insert(
            "PRIMER_MAX_HAIRPIN_TH",
            format!("{:.6}", params.max_hairpin_melt),
        );
        settings.insert("PRIMER_MAX_POLY_X", "7".to_string());
        settings.insert("PRIMER_PAIR_MAX_COMPL_ANY", "13.0".to_string());
        if let Some(dir) = &self.config_dir {
            settings.insert("PRIMER_THERMODYNAMIC_PARAMETERS_PATH", dir.clone());
        }

        let primer_max = primer_max as i64;
        let left_end = start + left_buffer as i64 + primer_max;
        let right_start = start + length - right_buffer as i64 - primer_max;
        let exclude_length = right_start - left_end;
        let optimize = (left_buffer > 0 || right_buffer > 0) && exclude_length >= 0;

        if optimize {
            if exclude_length < primer_max {
                return Err(PrimerError::NoPrimers {
                    id: id.to_string(),
                    reason: format!(
                        "PCR region of {exclude_length}bp is shorter than the {primer_max}bp maximum primer"
                    ),
                });
            }
            settings.insert("PRIMER_TASK", "generic".to_string());
            settings.insert("PRIMER_PICK_LEFT_PRIMER", "1".to_string());
            settings.insert("PRIMER_PICK_INTERNAL_OLIGO", "0".to_string());
            settings.insert("PRIMER_PICK_RIGHT_PRIMER", "1".to_string());
            if left_buffer == 0 {
                settings.insert("SEQUENCE_FORCE_LEFT_START", start.to_string());
            } else if right_buffer == 0 {
                settings.insert("SEQUENCE_FORCE_RIGHT_START", (start + length - 1).to_string());
            }
            settings.insert(
                "SEQUENCE_PRIMER_PAIR_OK_REGION_LIST",
                format!(
                    "{},{},{},{}",
                    start,
                    left_buffer as i64 + primer_max,
                    right_start,
                    right_buffer as i64 + primer_max
                ),
            );
            settings.insert(
                "PRIMER_PRODUCT_SIZE_RANGE",
                format!("{}-{}", exclude_length + 2 * primer_max, length),
            );
        } else {
            settings.insert("PRIMER_TASK", "pick_cloning_primers".to_string());
            settings.insert("SEQUENCE_INCLUDED_REGION", format!("{start},{length}"));
            settings.insert("PRIMER_PRODUCT_SIZE_RANGE", format!("{length}-{length}"));
        }

        let mut ret = settings
            .into_iter()
            .map(|(key, value)| format!("{key}={value}\n"))
            .collect::<String>();
        ret.push('=');
        ret.push('\n');
        Ok(ret)
    }

    /// Runs primer3 on `settings` and returns its output file.
    fn run(&self, settings: &str) -> Result<String, ToolError> {
        let io_error = |e: std::io::Error| ToolError::Io {
            message: format!("primer3 temporary file: {e}"),
        };
        let mut input = tempfile::Builder::new()
            .prefix("primer3-in-")
            .tempfile()
            .map_err(io_error)?;
        input.write_all(settings.as_bytes()).map_err(io_error)?;
        input.flush().map_err(io_error)?;
        let output = tempfile::Builder::new()
            .prefix("primer3-out-")
            .tempfile()
            .map_err(io_error)?;

        let args = vec![
            input.path().display().to_string(),
            "-output".to_string(),
            output.path().display().to_string(),
            "-strict_tags".to_string(),
        ];
        run_tool(&self.executable, &args)?;
        std::fs::read_to_string(output.path()).map_err(io_error)
    }
}

/// Primer pair from primer3 output, with ranges shifted back by `offset`.
fn parse(output: &str, offset: i64, id: &str) -> Result<[Primer; 2], PrimerError> {
    let results: HashMap<&str, &str> = output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .collect();

    let no_primers = |reason: String| PrimerError::NoPrimers {
        id: id.to_string(),
        reason,
    };
    if let Some(error) = results.get("PRIMER_ERROR").filter(|e| !e.is_empty()) {
        return Err(no_primers(format!("primer3 error: {error}")));
    }
    if let Some(warning) = results.get("PRIMER_WARNING").filter(|w| !w.is_empty()) {
        return Err(no_primers(format!("primer3 warning: {warning}")));
    }
    if results.get("PRIMER_PAIR_NUM_RETURNED").copied() == Some("0") {
        let explain = results.get("PRIMER_PAIR_EXPLAIN").copied().unwrap_or_default();
        return Err(no_primers(format!("no pair returned ({explain})")));
    }

    let float = |key: String| {
        results
            .get(key.as_str())
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    let pair_penalty = float("PRIMER_PAIR_0_PENALTY".to_string());

    let primer = |side: &str| -> Result<Primer, PrimerError> {
        let seq = results
            .get(format!("PRIMER_{side}_0_SEQUENCE").as_str())
            .map(|s| s.to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| no_primers(format!("no {side} primer in primer3 output")))?;
        let position = results
            .get(format!("PRIMER_{side}_0").as_str())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| no_primers(format!("no {side} primer position in primer3 output")))?
            - offset;
        let length = seq.len() as i64;
        let range = if side == "LEFT" {
            (position, position + length - 1)
        } else {
            (position - length + 1, position)
        };
        Ok(Primer {
            strand: side == "LEFT",
            penalty: float(format!("PRIMER_{side}_0_PENALTY")),
            pair_penalty,
            tm: float(format!("PRIMER_{side}_0_TM")),
            gc: float(format!("PRIMER_{side}_0_GC_PERCENT")),
            range,
            seq,
        })
    };

    Ok([primer("LEFT")?, primer("RIGHT")?])
}

/// Prepends homology bases primer3 could not design into the primers.
fn add_homology(
    primers: &mut [Primer; 2],
    target: &str,
    add_left: usize,
    add_right: usize,
    id: &str,
) -> Result<(), PrimerError> {
    let out_of_range = || PrimerError::NoPrimers {
        id: id.to_string(),
        reason: "homology extends beyond the target".to_string(),
    };
    if add_left > 0 {
        let start = primers[0].range.0;
        let homology = circular_range(target, start - add_left as i64..start).ok_or_else(out_of_range)?;
        primers[0].seq = format!("{homology}{}", primers[0].seq);
        primers[0].range.0 -= add_left as i64;
    }
    if add_right > 0 {
        let end = primers[1].range.1;
        let homology =
            circular_range(target, end + 1..end + 1 + add_right as i64).ok_or_else(out_of_range)?;
        primers[1].seq = format!("{}{}", reverse_complement(&homology), primers[1].seq);
        primers[1].range.1 += add_right as i64;
    }
    Ok(())
}

/// Rejects products too short for PCR, pairs primer3 scored too poorly, and
/// primers that also bind elsewhere in the source template.
fn check_design(
    f: &Frag,
    primers: &[Primer; 2],
    annealing: &[String; 2],
    params: &AssemblyParameters,
) -> Result<(), PrimerError> {
    let length = (primers[1].range.1 - primers[0].range.0 + 1).max(0) as usize;
    if length < params.pcr_min_length {
        return Err(PrimerError::ProductTooShort {
            id: f.id.clone(),
            length,
            min: params.pcr_min_length,
        });
    }
    if primers[0].pair_penalty > params.pcr_max_penalty {
        return Err(PrimerError::PenaltyTooHigh {
            pair_penalty: primers[0].pair_penalty,
            max: params.pcr_max_penalty,
        });
    }
    if let Some(template) = &f.template {
        for primer in annealing {
            if let Some(site) = off_target_site(primer, template, params.pcr_max_offtarget_tm) {
                return Err(PrimerError::OffTargetMismatch {
                    primer: primer.clone(),
                    site,
                });
            }
        }
    }
    Ok(())
}

impl PrimerDesigner for Primer3Designer {
    fn design(
        &self,
        last: &Frag,
        frag: &Frag,
        next: &Frag,
        target: &str,
        params: &AssemblyParameters,
    ) -> Result<[Primer; 2], PrimerError> {
        let target = target.to_ascii_uppercase();
        if target.is_empty() {
            return Err(PrimerError::NoPrimers {
                id: frag.id.clone(),
                reason: "empty target".to_string(),
            });
        }

        let mut f = frag.clone();
        shrink(&mut f, next, params.max_homology, params.pcr_min_length);
        let window = PrimerWindow::new(
            &f,
            bp_to_add(last, &f, params),
            bp_to_add(&f, next, params),
        );
        let left_buffer = buffer(last.distance_to(&f), params);
        let right_buffer = buffer(f.distance_to(next), params);

        let settings = self.settings(&f.id, &target, &window, left_buffer, right_buffer, params)?;
        let output = self.run(&settings)?;
        let mut primers = parse(&output, target.len() as i64, &f.id)?;
        let annealing = [primers[0].seq.clone(), primers[1].seq.clone()];
        add_homology(&mut primers, &target, window.add_left, window.add_right, &f.id)?;
        check_design(&f, &primers, &annealing, params)?;

        log::trace!(
            "primers for {}: {} {}",
            f.id,
            primers[0].seq,
            primers[1].seq
        );
        Ok(primers)
    }
}
