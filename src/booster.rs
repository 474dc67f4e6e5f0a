//! XGBoost JSON model handle.
//!
//! Reads the layout written by `Booster.save_model("model.json")` for the
//! `gbtree`, `dart` and `gblinear` boosters and evaluates it on dense `f32`
//! rows. A NaN feature value is treated as missing: tree splits send it in
//! their default direction and linear models skip it, as XGBoost does.
//!
//! Loading only fails on files XGBoost itself could not read. Models that
//! load but use something this evaluator lacks (categorical splits,
//! vector-leaf trees) are kept, and `predict` reports why it cannot run.

use std::fs;
use std::path::Path;

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};
use serde::Deserialize;
use tracing::warn;

use crate::error::{LoadError, ServiceError};

const LEAF: i32 = -1;

#[derive(Deserialize)]
struct ModelDoc {
    learner: LearnerDoc,
}

#[derive(Deserialize)]
struct LearnerDoc {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBoosterDoc,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveDoc,
}

// Unknown booster names fail here as a decode error, as they do in XGBoost.
#[derive(Deserialize)]
#[serde(tag = "name")]
enum GradientBoosterDoc {
    #[serde(rename = "gbtree")]
    GbTree { model: GbTreeDoc },
    #[serde(rename = "dart")]
    Dart {
        gbtree: DartTreesDoc,
        weight_drop: Vec<f32>,
    },
    #[serde(rename = "gblinear")]
    GbLinear { model: LinearDoc },
}

#[derive(Deserialize)]
struct DartTreesDoc {
    model: GbTreeDoc,
}

#[derive(Deserialize)]
struct GbTreeDoc {
    trees: Vec<TreeDoc>,
    tree_info: Vec<i64>,
}

#[derive(Deserialize)]
struct LinearDoc {
    weights: Vec<f32>,
}

#[derive(Deserialize)]
struct TreeDoc {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<u8>,
    #[serde(default)]
    tree_param: Option<TreeParamDoc>,
}

#[derive(Deserialize)]
struct TreeParamDoc {
    #[serde(default)]
    size_leaf_vector: Option<String>,
}

// Older releases write `default_left` as booleans, newer ones as 0/1.
#[derive(Deserialize, Clone, Copy)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl From<Flag> for bool {
    fn from(flag: Flag) -> bool {
        match flag {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

#[derive(Deserialize)]
struct LearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_class: Option<String>,
    num_feature: String,
    #[serde(default)]
    num_target: Option<String>,
}

#[derive(Deserialize)]
struct ObjectiveDoc {
    name: String,
}

/// Learning objective, reduced to what prediction needs: how `base_score`
/// maps into margin space and how margins map to outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// `binary:logistic`, `reg:logistic`
    Logistic,
    /// `binary:logitraw`
    LogitRaw,
    /// `count:poisson`, `reg:gamma`, `reg:tweedie`
    LogLink,
    /// `multi:softprob`
    SoftProb,
    /// `multi:softmax`
    SoftMax,
    /// Squared error, ranking and anything unrecognised.
    Identity,
}

impl Objective {
    pub fn from_name(name: &str) -> Option<Self> {
        let objective = match name {
            "binary:logistic" | "reg:logistic" => Objective::Logistic,
            "binary:logitraw" => Objective::LogitRaw,
            "count:poisson" | "reg:gamma" | "reg:tweedie" => Objective::LogLink,
            "multi:softprob" => Objective::SoftProb,
            "multi:softmax" => Objective::SoftMax,
            "reg:squarederror" | "reg:linear" | "reg:squaredlogerror" | "reg:pseudohubererror"
            | "reg:absoluteerror" | "reg:quantileerror" | "rank:pairwise" | "rank:ndcg"
            | "rank:map" => Objective::Identity,
            _ => return None,
        };
        Some(objective)
    }

    fn base_margin(self, base_score: f32) -> Result<f32, String> {
        match self {
            Objective::Logistic | Objective::LogitRaw => {
                if base_score > 0.0 && base_score < 1.0 {
                    Ok((base_score / (1.0 - base_score)).ln())
                } else {
                    Err(format!(
                        "base_score {base_score} must lie in (0, 1) for a logistic objective"
                    ))
                }
            }
            Objective::LogLink => {
                if base_score > 0.0 {
                    Ok(base_score.ln())
                } else {
                    Err(format!(
                        "base_score {base_score} must be positive for a log-link objective"
                    ))
                }
            }
            Objective::SoftProb | Objective::SoftMax | Objective::Identity => Ok(base_score),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    left: i32,
    right: i32,
    feature: usize,
    // Split threshold on internal nodes, leaf value on leaves.
    value: f32,
    default_left: bool,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.left == LEAF
    }
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    categorical: bool,
    vector_leaf: bool,
}

impl Tree {
    fn from_doc(
        doc: TreeDoc,
        index: usize,
        num_feature: usize,
        origin: &Path,
    ) -> Result<Self, LoadError> {
        let invalid = |reason: String| LoadError::Invalid {
            path: origin.to_path_buf(),
            reason: format!("tree {index}: {reason}"),
        };

        let n = doc.left_children.len();
        if n == 0 {
            return Err(invalid("no nodes".to_string()));
        }
        for (field, len) in [
            ("right_children", doc.right_children.len()),
            ("split_indices", doc.split_indices.len()),
            ("split_conditions", doc.split_conditions.len()),
            ("default_left", doc.default_left.len()),
        ] {
            if len != n {
                return Err(invalid(format!("{field} has {len} entries, expected {n}")));
            }
        }
        if !doc.split_type.is_empty() && doc.split_type.len() != n {
            return Err(invalid(format!(
                "split_type has {} entries, expected {n}",
                doc.split_type.len()
            )));
        }

        let nodes: Vec<Node> = (0..n)
            .map(|i| Node {
                left: doc.left_children[i],
                right: doc.right_children[i],
                feature: usize::try_from(doc.split_indices[i]).unwrap_or(usize::MAX),
                value: doc.split_conditions[i],
                default_left: doc.default_left[i].into(),
            })
            .collect();

        // Walk from the root so deleted slots left behind by pruning are
        // ignored, and so traversal at predict time cannot loop or index
        // out of bounds.
        let mut categorical = false;
        let mut seen = vec![false; n];
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            if std::mem::replace(&mut seen[idx], true) {
                return Err(invalid(format!("node {idx} is reachable more than once")));
            }
            let node = &nodes[idx];
            if node.is_leaf() {
                if node.right != LEAF {
                    return Err(invalid(format!(
                        "node {idx} has a right child but no left child"
                    )));
                }
                continue;
            }
            categorical |= doc.split_type.get(idx).copied().unwrap_or(0) != 0;
            if node.feature >= num_feature {
                return Err(invalid(format!(
                    "node {idx} splits on feature {} but the model has {num_feature}",
                    doc.split_indices[idx]
                )));
            }
            for child in [node.left, node.right] {
                match usize::try_from(child) {
                    Ok(c) if c < n && c != idx => stack.push(c),
                    _ => {
                        return Err(invalid(format!(
                            "node {idx} has child {child} outside 0..{n}"
                        )))
                    }
                }
            }
        }

        let vector_leaf = doc
            .tree_param
            .and_then(|p| p.size_leaf_vector)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .is_some_and(|size| size > 1);

        Ok(Self {
            nodes,
            categorical,
            vector_leaf,
        })
    }

    fn leaf_value(&self, row: ArrayView1<'_, f32>) -> f32 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.is_leaf() {
                return node.value;
            }
            let x = row[node.feature];
            let go_left = if x.is_nan() {
                node.default_left
            } else {
                x < node.value
            };
            idx = if go_left { node.left } else { node.right } as usize;
        }
    }
}

#[derive(Debug, Clone)]
enum Ensemble {
    Trees {
        trees: Vec<Tree>,
        groups: Vec<usize>,
        // Per-tree scale, `dart` only.
        weights: Option<Vec<f32>>,
    },
    // `(num_feature + 1) * num_groups` values, feature-major, biases last.
    Linear { weights: Vec<f32> },
}

/// A loaded XGBoost model.
#[derive(Debug, Clone)]
pub struct Booster {
    ensemble: Ensemble,
    booster_name: &'static str,
    num_feature: usize,
    num_groups: usize,
    base_margin: f32,
    objective: Objective,
    objective_name: String,
    feature_names: Vec<String>,
    unsupported: Option<String>,
}

impl Booster {
    /// Reads a JSON model file.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let bytes = fs::read(path).map_err(|e| LoadError::from_io(path, e))?;
        Self::from_slice(&bytes, path)
    }

    /// Parses an in-memory JSON model. `origin` is only used in errors and logs.
    pub fn from_slice(bytes: &[u8], origin: &Path) -> Result<Self, LoadError> {
        let doc: ModelDoc = serde_json::from_slice(bytes).map_err(|source| LoadError::Json {
            path: origin.to_path_buf(),
            source,
        })?;
        Self::from_doc(doc, origin)
    }

    fn from_doc(doc: ModelDoc, origin: &Path) -> Result<Self, LoadError> {
        let invalid = |reason: String| LoadError::Invalid {
            path: origin.to_path_buf(),
            reason,
        };

        let learner = doc.learner;
        let params = learner.learner_model_param;
        let num_feature = parse_count("num_feature", &params.num_feature).map_err(invalid)?;
        let num_class = match params.num_class.as_deref() {
            Some(raw) => parse_count("num_class", raw).map_err(invalid)?,
            None => 0,
        };
        let num_target = match params.num_target.as_deref() {
            Some(raw) => parse_count("num_target", raw).map_err(invalid)?,
            None => 1,
        };
        let num_groups = num_class.max(num_target).max(1);

        let mut unsupported = None;

        let objective_name = learner.objective.name;
        let objective = match Objective::from_name(&objective_name) {
            Some(o) => o,
            None => {
                warn!(
                    objective = %objective_name,
                    path = %origin.display(),
                    "unrecognised objective, predictions will be raw margins"
                );
                Objective::Identity
            }
        };
        let base_score = parse_base_score(&params.base_score).map_err(invalid)?;
        let base_margin = match objective.base_margin(base_score) {
            Ok(m) => m,
            Err(reason) => {
                unsupported = Some(reason);
                f32::NAN
            }
        };

        let (ensemble, booster_name) = match learner.gradient_booster {
            GradientBoosterDoc::GbTree { model } => (
                trees_from_doc(model, None, num_feature, num_groups, origin)?,
                "gbtree",
            ),
            GradientBoosterDoc::Dart {
                gbtree,
                weight_drop,
            } => (
                trees_from_doc(gbtree.model, Some(weight_drop), num_feature, num_groups, origin)?,
                "dart",
            ),
            GradientBoosterDoc::GbLinear { model } => {
                let expected = (num_feature + 1) * num_groups;
                if model.weights.len() != expected {
                    return Err(invalid(format!(
                        "gblinear has {} weights, expected {expected}",
                        model.weights.len()
                    )));
                }
                (
                    Ensemble::Linear {
                        weights: model.weights,
                    },
                    "gblinear",
                )
            }
        };

        if let Ensemble::Trees { trees, .. } = &ensemble {
            if trees.iter().any(|t| t.categorical) {
                unsupported.get_or_insert_with(|| "categorical splits".to_string());
            }
            if trees.iter().any(|t| t.vector_leaf) {
                unsupported.get_or_insert_with(|| "vector-leaf trees".to_string());
            }
        }
        if let Some(reason) = &unsupported {
            warn!(
                path = %origin.display(),
                reason = %reason,
                "model loaded but cannot be evaluated"
            );
        }

        if !learner.feature_names.is_empty() && learner.feature_names.len() != num_feature {
            warn!(
                path = %origin.display(),
                names = learner.feature_names.len(),
                num_feature,
                "model feature names do not match its feature count"
            );
        }

        Ok(Self {
            ensemble,
            booster_name,
            num_feature,
            num_groups,
            base_margin,
            objective,
            objective_name,
            feature_names: learner.feature_names,
            unsupported,
        })
    }

    pub fn num_features(&self) -> usize {
        self.num_feature
    }

    /// Outputs per row before any `multi:softmax` argmax.
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    /// Zero for `gblinear`.
    pub fn num_trees(&self) -> usize {
        match &self.ensemble {
            Ensemble::Trees { trees, .. } => trees.len(),
            Ensemble::Linear { .. } => 0,
        }
    }

    /// `gbtree`, `dart` or `gblinear`.
    pub fn booster_name(&self) -> &'static str {
        self.booster_name
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn objective_name(&self) -> &str {
        &self.objective_name
    }

    /// Feature names saved with the model. Empty when the model was trained
    /// on unnamed data.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Why `predict` refuses to run, if it does.
    pub fn unsupported_reason(&self) -> Option<&str> {
        self.unsupported.as_deref()
    }

    /// Raw scores, shape `(rows, num_groups)`.
    pub fn predict_margin(&self, rows: ArrayView2<'_, f32>) -> Result<Array2<f32>, ServiceError> {
        if let Some(reason) = &self.unsupported {
            return Err(ServiceError::UnsupportedModel {
                reason: reason.clone(),
            });
        }
        if rows.ncols() != self.num_feature {
            return Err(ServiceError::FeatureShape {
                expected: self.num_feature,
                actual: rows.ncols(),
            });
        }

        let mut out = Array2::from_elem((rows.nrows(), self.num_groups), self.base_margin);
        for (row, mut acc) in rows.outer_iter().zip(out.outer_iter_mut()) {
            match &self.ensemble {
                Ensemble::Trees {
                    trees,
                    groups,
                    weights,
                } => {
                    for (i, (tree, &group)) in trees.iter().zip(groups).enumerate() {
                        let scale = weights.as_ref().map_or(1.0, |w| w[i]);
                        acc[group] += scale * tree.leaf_value(row);
                    }
                }
                Ensemble::Linear { weights } => {
                    let (coef, bias) = weights.split_at(self.num_feature * self.num_groups);
                    for (a, b) in acc.iter_mut().zip(bias) {
                        *a += b;
                    }
                    for (&x, w) in row.iter().zip(coef.chunks(self.num_groups)) {
                        if x.is_nan() {
                            continue;
                        }
                        for (a, w) in acc.iter_mut().zip(w) {
                            *a += x * w;
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Transformed predictions. `multi:softmax` yields one column holding the
    /// winning class index; every other objective yields `num_groups` columns.
    pub fn predict(&self, rows: ArrayView2<'_, f32>) -> Result<Array2<f32>, ServiceError> {
        let mut margin = self.predict_margin(rows)?;
        match self.objective {
            Objective::Logistic => margin.mapv_inplace(sigmoid),
            Objective::LogLink => margin.mapv_inplace(f32::exp),
            Objective::SoftProb => {
                for row in margin.outer_iter_mut() {
                    softmax(row);
                }
            }
            Objective::SoftMax => {
                let labels = margin.map_axis(Axis(1), |row| argmax(row) as f32);
                return Ok(labels.insert_axis(Axis(1)));
            }
            Objective::LogitRaw | Objective::Identity => {}
        }
        Ok(margin)
    }
}

fn trees_from_doc(
    model: GbTreeDoc,
    weights: Option<Vec<f32>>,
    num_feature: usize,
    num_groups: usize,
    origin: &Path,
) -> Result<Ensemble, LoadError> {
    let invalid = |reason: String| LoadError::Invalid {
        path: origin.to_path_buf(),
        reason,
    };

    if model.tree_info.len() != model.trees.len() {
        return Err(invalid(format!(
            "tree_info has {} entries for {} trees",
            model.tree_info.len(),
            model.trees.len()
        )));
    }
    if let Some(w) = &weights {
        if w.len() != model.trees.len() {
            return Err(invalid(format!(
                "weight_drop has {} entries for {} trees",
                w.len(),
                model.trees.len()
            )));
        }
    }
    let groups = model
        .tree_info
        .iter()
        .map(|&g| {
            usize::try_from(g)
                .ok()
                .filter(|&g| g < num_groups)
                .ok_or_else(|| {
                    invalid(format!(
                        "tree_info group {g} out of range for {num_groups} output groups"
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let trees = model
        .trees
        .into_iter()
        .enumerate()
        .map(|(i, t)| Tree::from_doc(t, i, num_feature, origin))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Ensemble::Trees {
        trees,
        groups,
        weights,
    })
}

fn parse_count(field: &str, raw: &str) -> Result<usize, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("{field} {raw:?} is not a non-negative integer"))
}

// Written as "5E-1", or "[5E-1]" (one entry per target) by newer releases.
fn parse_base_score(raw: &str) -> Result<f32, String> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let first = inner.split(',').next().unwrap_or_default().trim();
    first
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("base_score {raw:?} is not a finite number"))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(mut row: ArrayViewMut1<'_, f32>) {
    let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    row.mapv_inplace(|v| (v - max).exp());
    let sum = row.sum();
    row.mapv_inplace(|v| v / sum);
}

// First index wins on ties.
fn argmax(row: ArrayView1<'_, f32>) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::{json, Value};

    const FIXTURE: &str = include_str!("../tests/fixtures/dropout_model.json");

    fn fixture() -> Booster {
        Booster::from_slice(FIXTURE.as_bytes(), Path::new("fixture.json")).unwrap()
    }

    fn fixture_value() -> Value {
        serde_json::from_str(FIXTURE).unwrap()
    }

    fn load_value(v: &Value) -> Result<Booster, LoadError> {
        Booster::from_slice(v.to_string().as_bytes(), Path::new("edited.json"))
    }

    fn stump(value: f32) -> Value {
        json!({
            "left_children": [-1],
            "right_children": [-1],
            "split_indices": [0],
            "split_conditions": [value],
            "default_left": [false],
        })
    }

    fn multiclass(objective: &str) -> Value {
        json!({
            "learner": {
                "gradient_booster": {
                    "name": "gbtree",
                    "model": {
                        "trees": [stump(0.0), stump(1.0), stump(2.0)],
                        "tree_info": [0, 1, 2],
                    },
                },
                "learner_model_param": {
                    "base_score": "5E-1",
                    "num_class": "3",
                    "num_feature": "1",
                },
                "objective": { "name": objective },
            }
        })
    }

    #[test]
    fn reads_model_metadata() {
        let booster = fixture();
        assert_eq!(booster.num_features(), 3);
        assert_eq!(booster.num_groups(), 1);
        assert_eq!(booster.num_trees(), 2);
        assert_eq!(booster.booster_name(), "gbtree");
        assert_eq!(booster.objective(), Objective::Logistic);
        assert_eq!(booster.objective_name(), "binary:logistic");
        assert_eq!(
            booster.feature_names(),
            ["age_at_enrollment", "admission_grade", "units_approved_1st_sem"]
        );
        assert_eq!(booster.unsupported_reason(), None);
    }

    #[test]
    fn margins_follow_splits_and_default_directions() {
        let booster = fixture();
        let rows = array![
            [20.0, 130.0, 2.0],
            [30.0, 100.0, 6.0],
            [f32::NAN, f32::NAN, f32::NAN],
        ];
        let margin = booster.predict_margin(rows.view()).unwrap();

        assert_eq!(margin.shape(), &[3, 1]);
        assert!((margin[[0, 0]] - (-0.05)).abs() < 1e-5);
        assert!((margin[[1, 0]] - (-0.55)).abs() < 1e-5);
        assert!((margin[[2, 0]] - 0.55).abs() < 1e-5);
    }

    #[test]
    fn logistic_predictions_are_probabilities() {
        let booster = fixture();
        let rows = array![[20.0, 130.0, 2.0], [30.0, 100.0, 6.0]];
        let probs = booster.predict(rows.view()).unwrap();

        assert!((probs[[0, 0]] - sigmoid(-0.05)).abs() < 1e-5);
        assert!((probs[[1, 0]] - sigmoid(-0.55)).abs() < 1e-5);
        assert!(probs.iter().all(|&p| p > 0.0 && p < 1.0));
    }

    #[test]
    fn wrong_row_width_is_rejected() {
        let booster = fixture();
        let rows = array![[1.0, 2.0]];
        let err = booster.predict(rows.view()).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::FeatureShape {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn softprob_rows_sum_to_one() {
        let booster = load_value(&multiclass("multi:softprob")).unwrap();
        let probs = booster.predict(array![[0.0]].view()).unwrap();

        assert_eq!(probs.shape(), &[1, 3]);
        assert!((probs.row(0).sum() - 1.0).abs() < 1e-5);
        assert!(probs[[0, 2]] > probs[[0, 1]] && probs[[0, 1]] > probs[[0, 0]]);
    }

    #[test]
    fn softmax_returns_class_index() {
        let booster = load_value(&multiclass("multi:softmax")).unwrap();
        let labels = booster.predict(array![[0.0], [5.0]].view()).unwrap();
        assert_eq!(labels, array![[2.0f32], [2.0]]);
    }

    #[test]
    fn bracketed_base_score_is_accepted() {
        let mut v = fixture_value();
        v["learner"]["learner_model_param"]["base_score"] = json!("[5E-1]");
        let booster = load_value(&v).unwrap();
        let margin = booster
            .predict_margin(array![[20.0, 130.0, 2.0]].view())
            .unwrap();
        assert!((margin[[0, 0]] - (-0.05)).abs() < 1e-5);
    }

    #[test]
    fn boolean_default_left_is_accepted() {
        let mut v = fixture_value();
        v["learner"]["gradient_booster"]["model"]["trees"][0]["default_left"] =
            json!([true, false, false, false, false]);
        assert!(load_value(&v).is_ok());
    }

    #[test]
    fn unknown_objective_predicts_raw_margin() {
        let mut v = fixture_value();
        v["learner"]["objective"]["name"] = json!("custom:dropout");
        let booster = load_value(&v).unwrap();
        assert_eq!(booster.objective(), Objective::Identity);

        let out = booster.predict(array![[20.0, 130.0, 2.0]].view()).unwrap();
        // base_score passes through untransformed for identity objectives
        assert!((out[[0, 0]] - 0.45).abs() < 1e-5);
    }

    #[test]
    fn dart_scales_each_tree_by_its_drop_weight() {
        let mut v = fixture_value();
        let trees = v["learner"]["gradient_booster"].take();
        v["learner"]["gradient_booster"] = json!({
            "name": "dart",
            "gbtree": trees,
            "weight_drop": [1.0, 0.5],
        });
        let booster = load_value(&v).unwrap();
        assert_eq!(booster.booster_name(), "dart");

        let margin = booster
            .predict_margin(array![[20.0, 130.0, 2.0]].view())
            .unwrap();
        assert!((margin[[0, 0]] - (0.3 - 0.175)).abs() < 1e-5);
    }

    #[test]
    fn dart_drop_weights_must_cover_every_tree() {
        let mut v = fixture_value();
        let trees = v["learner"]["gradient_booster"].take();
        v["learner"]["gradient_booster"] = json!({
            "name": "dart",
            "gbtree": trees,
            "weight_drop": [1.0],
        });
        assert!(matches!(load_value(&v), Err(LoadError::Invalid { .. })));
    }

    #[test]
    fn linear_booster_skips_missing_features() {
        let v = json!({
            "learner": {
                "gradient_booster": {
                    "name": "gblinear",
                    "model": { "boosted_rounds": 10, "weights": [0.5, -1.0, 0.25] },
                },
                "learner_model_param": {
                    "base_score": "0",
                    "num_class": "0",
                    "num_feature": "2",
                    "num_target": "1",
                },
                "objective": { "name": "reg:squarederror" },
            }
        });
        let booster = load_value(&v).unwrap();
        assert_eq!(booster.booster_name(), "gblinear");
        assert_eq!(booster.num_trees(), 0);

        let out = booster
            .predict(array![[2.0, 1.0], [f32::NAN, 1.0]].view())
            .unwrap();
        assert!((out[[0, 0]] - 0.25).abs() < 1e-5);
        assert!((out[[1, 0]] - (-0.75)).abs() < 1e-5);
    }

    #[test]
    fn multi_target_trees_fill_one_column_each() {
        let mut v = fixture_value();
        v["learner"]["learner_model_param"]["num_target"] = json!("2");
        v["learner"]["gradient_booster"]["model"]["tree_info"] = json!([0, 1]);
        let booster = load_value(&v).unwrap();
        assert_eq!(booster.num_groups(), 2);

        let margin = booster
            .predict_margin(array![[20.0, 130.0, 2.0]].view())
            .unwrap();
        assert!((margin[[0, 0]] - 0.3).abs() < 1e-5);
        assert!((margin[[0, 1]] - (-0.35)).abs() < 1e-5);
    }

    #[test]
    fn mismatched_feature_names_still_load() {
        let mut v = fixture_value();
        v["learner"]["feature_names"] = json!(["age_at_enrollment"]);
        let booster = load_value(&v).unwrap();
        assert_eq!(booster.feature_names().len(), 1);
        assert_eq!(booster.num_features(), 3);
    }

    #[test]
    fn categorical_split_loads_but_cannot_predict() {
        let mut v = fixture_value();
        v["learner"]["gradient_booster"]["model"]["trees"][1]["split_type"] = json!([1, 0, 0]);
        let booster = load_value(&v).unwrap();
        assert_eq!(booster.unsupported_reason(), Some("categorical splits"));

        let err = booster
            .predict(array![[20.0, 130.0, 2.0]].view())
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedModel { .. }));
    }

    #[test]
    fn vector_leaf_trees_load_but_cannot_predict() {
        let mut v = fixture_value();
        v["learner"]["gradient_booster"]["model"]["trees"][0]["tree_param"]["size_leaf_vector"] =
            json!("2");
        let booster = load_value(&v).unwrap();
        assert_eq!(booster.unsupported_reason(), Some("vector-leaf trees"));
    }

    #[test]
    fn logistic_base_score_out_of_range_loads_but_cannot_predict() {
        let mut v = fixture_value();
        v["learner"]["learner_model_param"]["base_score"] = json!("1.5");
        let booster = load_value(&v).unwrap();
        assert!(booster.unsupported_reason().unwrap().contains("(0, 1)"));
        assert!(booster
            .predict_margin(array![[20.0, 130.0, 2.0]].view())
            .is_err());
    }

    #[test]
    fn unknown_booster_is_a_decode_error() {
        let mut v = fixture_value();
        v["learner"]["gradient_booster"] = json!({ "name": "gbforest", "model": {} });
        assert!(matches!(load_value(&v), Err(LoadError::Json { .. })));
    }

    #[test]
    fn mismatched_tree_arrays_are_invalid() {
        let mut v = fixture_value();
        v["learner"]["gradient_booster"]["model"]["trees"][0]["split_conditions"] =
            json!([4.5, 23.5]);
        let err = load_value(&v).unwrap_err();
        assert!(err.to_string().contains("split_conditions has 2 entries"));
    }

    #[test]
    fn cyclic_tree_is_invalid() {
        let mut v = fixture_value();
        let tree = &mut v["learner"]["gradient_booster"]["model"]["trees"][1];
        tree["left_children"] = json!([1, -1, -1]);
        tree["right_children"] = json!([1, -1, -1]);
        let err = load_value(&v).unwrap_err();
        assert!(err.to_string().contains("reachable more than once"));
    }

    #[test]
    fn split_on_unknown_feature_is_invalid() {
        let mut v = fixture_value();
        v["learner"]["gradient_booster"]["model"]["trees"][1]["split_indices"] = json!([7, 0, 0]);
        assert!(matches!(load_value(&v), Err(LoadError::Invalid { .. })));
    }

    #[test]
    fn tree_info_must_match_tree_count() {
        let mut v = fixture_value();
        v["learner"]["gradient_booster"]["model"]["tree_info"] = json!([0]);
        assert!(matches!(load_value(&v), Err(LoadError::Invalid { .. })));
    }

    #[test]
    fn truncated_json_is_a_decode_error() {
        let err =
            Booster::from_slice(&FIXTURE.as_bytes()[..200], Path::new("cut.json")).unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
        assert_eq!(err.kind(), "deserialize");
    }
}
