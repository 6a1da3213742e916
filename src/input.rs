//! The structures the core consumes from map ingestion: design rules and
//! the per-net input tables. Parsing and rule-set assignment happen in an
//! external collaborator; the core only reads these.

use crate::cell::{ShapeType, NUM_SHAPE_TYPES};
use crate::coords::{Cost, PathNum};

/// One subset of a design-rule set: line width, deposit radii, and the
/// center-to-center spacing requirements per shape-type pair.
#[derive(Clone, Debug)]
pub struct DesignRuleSubset {
    pub line_width_um: f32,
    /// Congestion-deposit radius around a centerline, per shape, in cells.
    /// `radius[Trace]` is half the line width.
    pub radius: [i32; NUM_SHAPE_TYPES],
    pub radius_squared: [i64; NUM_SHAPE_TYPES],
    /// Required centerline-to-centerline spacing per (shape, shape) pair,
    /// in cells. Anything closer is a design-rule violation.
    pub spacing: [[f32; NUM_SHAPE_TYPES]; NUM_SHAPE_TYPES],
}

impl DesignRuleSubset {
    /// A uniform rule-set useful for tests and simple maps: every shape
    /// deposits within `radius` cells and requires `spacing` cells of
    /// clearance from every other shape.
    pub fn uniform(line_width_um: f32, radius: i32, spacing: f32) -> Self {
        DesignRuleSubset {
            line_width_um,
            radius: [radius; NUM_SHAPE_TYPES],
            radius_squared: [(radius as i64) * (radius as i64); NUM_SHAPE_TYPES],
            spacing: [[spacing; NUM_SHAPE_TYPES]; NUM_SHAPE_TYPES],
        }
    }

    #[inline]
    pub fn spacing_for(&self, a: ShapeType, b: ShapeType) -> f32 {
        self.spacing[a.index()][b.index()]
    }
}

/// Per-net input tables, indexed by path number. Pseudo-nets occupy the
/// tail range `[num_nets, num_nets + num_pseudo_nets)`.
#[derive(Clone, Debug)]
pub struct InputValues {
    pub num_nets: usize,
    pub num_pseudo_nets: usize,

    pub net_names: Vec<String>,
    pub is_diff_pair: Vec<bool>,
    /// For a diff-pair child, its twin; unused otherwise.
    pub diff_pair_partner: Vec<usize>,
    /// For a diff-pair child, the pseudo-net carrying its midline.
    pub diff_pair_to_pseudo_net: Vec<usize>,
    /// For a pseudo-net, its two shoulder children.
    pub pseudo_net_to_diff_pair: Vec<(usize, usize)>,
    pub is_pseudo_net: Vec<bool>,
    /// Whether a pseudo-net's P and N terminals may be exchanged.
    pub pn_swappable: Vec<bool>,

    /// `design_rules[set][subset]`.
    pub design_rules: Vec<Vec<DesignRuleSubset>>,
    /// `design_rule_subset[path][set]`: which subset of each rule set a
    /// path routes under.
    pub design_rule_subset: Vec<Vec<u8>>,
    /// `foreign_subset[set][subset][other_set]`: the subset a foreign
    /// rule-set maps this subset onto when checking spacing across a
    /// rule-set boundary.
    pub foreign_subset: Vec<Vec<Vec<u8>>>,

    /// `diff_pair_pitch_cells[path][set]`: target centerline pitch of the
    /// pair, in cells.
    pub diff_pair_pitch_cells: Vec<Vec<f32>>,

    pub cell_size_um: f32,
    /// Cost of one vertical (via) step, in cells.
    pub base_vert_cost_cells: u32,

    /// User-defined cost multipliers; index 0 is the neutral multiplier 1.
    pub trace_cost_multiplier: Vec<u32>,
    pub via_cost_multiplier: Vec<u32>,

    /// Per-path allowed-direction mask.
    pub route_directions: Vec<u32>,
}

impl InputValues {
    /// A minimal input table for `num_nets` plain nets routed with a single
    /// uniform design rule, as used by the integration tests.
    pub fn plain(num_nets: usize, route_directions: u32, rule: DesignRuleSubset) -> Self {
        InputValues {
            num_nets,
            num_pseudo_nets: 0,
            net_names: (0..num_nets).map(|i| format!("net_{i}")).collect(),
            is_diff_pair: vec![false; num_nets],
            diff_pair_partner: vec![usize::MAX; num_nets],
            diff_pair_to_pseudo_net: vec![usize::MAX; num_nets],
            pseudo_net_to_diff_pair: Vec::new(),
            is_pseudo_net: vec![false; num_nets],
            pn_swappable: vec![false; num_nets],
            design_rules: vec![vec![rule]],
            design_rule_subset: vec![vec![0]; num_nets],
            foreign_subset: vec![vec![vec![0]]],
            diff_pair_pitch_cells: vec![vec![0.0]; num_nets],
            cell_size_um: 100.0,
            base_vert_cost_cells: 2,
            trace_cost_multiplier: vec![1],
            via_cost_multiplier: vec![1],
            route_directions: vec![route_directions; num_nets],
        }
    }

    #[inline]
    pub fn total_nets(&self) -> usize {
        self.num_nets + self.num_pseudo_nets
    }

    /// The design-rule subset `path` routes under within `set`. The
    /// universal repellent borrows subset 0.
    #[inline]
    pub fn subset_of(&self, path: PathNum, set: u8) -> u8 {
        if path >= self.total_nets() {
            return 0;
        }
        self.design_rule_subset[path][set as usize]
    }

    #[inline]
    pub fn rule(&self, set: u8, subset: u8) -> &DesignRuleSubset {
        &self.design_rules[set as usize][subset as usize]
    }

    /// The rule subset governing `path` at a cell with rule set `set`.
    #[inline]
    pub fn rule_for_path(&self, path: PathNum, set: u8) -> &DesignRuleSubset {
        self.rule(set, self.subset_of(path, set))
    }

    /// Distance cost of one vertical step, in hundredths of a cell.
    #[inline]
    pub fn base_vertical_cost(&self) -> Cost {
        self.base_vert_cost_cells as Cost * crate::config::ONE_TRAVERSAL
    }

    /// Whether any non-neutral cost multiplier was supplied. Iteration 1 is
    /// excluded from best-iteration selection when this holds.
    pub fn cost_multipliers_used(&self) -> bool {
        self.trace_cost_multiplier.iter().any(|&m| m != 1)
            || self.via_cost_multiplier.iter().any(|&m| m != 1)
    }

    /// True when `other` should not repel `path`: itself, its diff-pair
    /// twin, and the pseudo/child relationship in either direction.
    pub fn is_friendly(&self, path: PathNum, other: PathNum) -> bool {
        if path == other {
            return true;
        }
        let total = self.total_nets();
        if path < total && self.is_diff_pair[path] {
            if self.diff_pair_partner[path] == other || self.diff_pair_to_pseudo_net[path] == other
            {
                return true;
            }
        }
        if path < total && self.is_pseudo_net[path] {
            let (c1, c2) = self.pseudo_net_to_diff_pair[path - self.num_nets];
            if c1 == other || c2 == other {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendliness_is_limited_to_the_family() {
        let mut inputs = InputValues::plain(4, crate::direction::ANY, DesignRuleSubset::uniform(100.0, 1, 1.0));
        // Make nets 0 and 1 a diff pair under pseudo-net 4.
        inputs.num_pseudo_nets = 1;
        inputs.is_diff_pair[0] = true;
        inputs.is_diff_pair[1] = true;
        inputs.diff_pair_partner[0] = 1;
        inputs.diff_pair_partner[1] = 0;
        inputs.diff_pair_to_pseudo_net[0] = 4;
        inputs.diff_pair_to_pseudo_net[1] = 4;
        inputs.is_diff_pair.push(false);
        inputs.diff_pair_partner.push(usize::MAX);
        inputs.diff_pair_to_pseudo_net.push(usize::MAX);
        inputs.is_pseudo_net.push(true);
        inputs.pn_swappable.push(true);
        inputs.pseudo_net_to_diff_pair.push((0, 1));
        inputs.net_names.push("pseudo_0".into());
        inputs.design_rule_subset.push(vec![0]);
        inputs.diff_pair_pitch_cells.push(vec![4.0]);
        inputs.route_directions.push(crate::direction::ANY);

        assert!(inputs.is_friendly(0, 1));
        assert!(inputs.is_friendly(0, 4));
        assert!(inputs.is_friendly(4, 1));
        assert!(!inputs.is_friendly(0, 2));
        assert!(!inputs.is_friendly(2, 3));
        // The universal repellent is friendly to nobody.
        assert!(!inputs.is_friendly(0, 5));
    }
}
