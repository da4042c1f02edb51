//! Layer tree for inference and quantizer insertion
//!
//! A model is a tree of [`Node`]s. Containers hold named children:
//! [`Sequential`] runs them in order, [`Module`] runs them with a fixed custom
//! forward ([`Forward`]). Leaves are computational [`Layer`]s or activation
//! [`Quantizer`]s.
//!
//! ```text
//! Sequential
//!  ├─ "0": Conv2d
//!  ├─ "1": ReLU
//!  └─ "block": Module(Residual)
//!      ├─ "conv": Conv2d
//!      └─ "bn": BatchNorm2d
//! ```

mod layers;
mod rewrite;

pub use layers::{BatchNorm, Conv2d, Layer, Linear, Pool2d};
pub use rewrite::duplicate_model_with_quant;

use crate::quant::Quantizer;
use crate::{Error, Result, Tensor};
use std::collections::HashMap;
use std::fmt;

/// Classification used when walking the tree
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Holds named children
    Container,
    /// Leaf layer that gets an activation quantizer
    RecognizedLeaf,
    /// Any other leaf, including quantizers
    OtherLeaf,
}

/// How a [`Module`] combines its children
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Forward {
    /// Children in order
    Chain,
    /// Children in order, then the block input is added to the result
    Residual,
}

/// Ordered container
#[derive(Clone, Debug, Default)]
pub struct Sequential {
    children: Vec<(String, Node)>,
}

impl Sequential {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named child, returning self for chaining
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, name: impl Into<String>, child: impl Into<Node>) -> Self {
        self.push(name, child);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, child: impl Into<Node>) {
        self.children.push((name.into(), child.into()));
    }

    pub fn children(&self) -> &[(String, Node)] {
        &self.children
    }

    pub fn into_children(self) -> Vec<(String, Node)> {
        self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Container with named children and a fixed forward rule
#[derive(Clone, Debug)]
pub struct Module {
    type_name: String,
    forward: Forward,
    children: Vec<(String, Node)>,
}

impl Module {
    pub fn new(type_name: impl Into<String>, forward: Forward) -> Self {
        Self {
            type_name: type_name.into(),
            forward,
            children: Vec::new(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, name: impl Into<String>, child: impl Into<Node>) -> Self {
        self.children.push((name.into(), child.into()));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn forward_rule(&self) -> Forward {
        self.forward
    }

    pub fn children(&self) -> &[(String, Node)] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<(String, Node)> {
        &mut self.children
    }
}

/// Node of a layer tree
#[derive(Clone, Debug)]
pub enum Node {
    Sequential(Sequential),
    Module(Module),
    Layer(Layer),
    Quant(Quantizer),
}

fn run_chain(children: &mut [(String, Node)], input: &Tensor) -> Result<Tensor> {
    let mut x = input.clone();
    for (_, child) in children.iter_mut() {
        x = child.forward(&x)?;
    }
    Ok(x)
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Sequential(_) | Node::Module(_) => NodeKind::Container,
            Node::Layer(layer) if layer.is_recognized() => NodeKind::RecognizedLeaf,
            Node::Layer(_) | Node::Quant(_) => NodeKind::OtherLeaf,
        }
    }

    /// Run the tree on one batch
    ///
    /// Takes `&mut self` because calibrating quantizers update their state.
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        match self {
            Node::Sequential(seq) => run_chain(&mut seq.children, input),
            Node::Module(m) => {
                let out = run_chain(&mut m.children, input)?;
                match m.forward {
                    Forward::Chain => Ok(out),
                    Forward::Residual => {
                        if out.shape() != input.shape() {
                            return Err(Error::ShapeMismatch {
                                expected: input.shape().to_vec(),
                                got: out.shape().to_vec(),
                            });
                        }
                        Ok(Tensor::new(out.into_data() + input.data()))
                    }
                }
            }
            Node::Layer(layer) => layer.forward(input),
            Node::Quant(q) => q.forward(input),
        }
    }

    /// Named children of a container; empty for leaves
    pub fn children(&self) -> &[(String, Node)] {
        match self {
            Node::Sequential(seq) => seq.children(),
            Node::Module(m) => m.children(),
            Node::Layer(_) | Node::Quant(_) => &[],
        }
    }

    fn children_mut(&mut self) -> &mut [(String, Node)] {
        match self {
            Node::Sequential(seq) => seq.children.as_mut_slice(),
            Node::Module(m) => m.children.as_mut_slice(),
            Node::Layer(_) | Node::Quant(_) => &mut [],
        }
    }

    /// All parameters with dotted paths, e.g. `features.0.weight`
    pub fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut out = Vec::new();
        self.collect_parameters("", &mut out);
        out
    }

    fn collect_parameters(&self, prefix: &str, out: &mut Vec<(String, Tensor)>) {
        match self {
            Node::Layer(layer) => {
                for (name, t) in layer.parameters() {
                    out.push((join(prefix, name), t.clone()));
                }
            }
            _ => {
                for (name, child) in self.children() {
                    child.collect_parameters(&join(prefix, name), out);
                }
            }
        }
    }

    /// Replace parameters by dotted path
    ///
    /// Every parameter of the tree must be present with a matching shape.
    /// Extra entries are ignored.
    pub fn load_state_dict(&mut self, state: &[(String, Tensor)]) -> Result<()> {
        let lookup: HashMap<&str, &Tensor> =
            state.iter().map(|(name, t)| (name.as_str(), t)).collect();
        let mut used = 0usize;
        self.assign_parameters("", &lookup, &mut used)?;
        if used < lookup.len() {
            tracing::warn!(
                unused = lookup.len() - used,
                "state dict has entries with no matching parameter"
            );
        }
        Ok(())
    }

    fn assign_parameters(
        &mut self,
        prefix: &str,
        lookup: &HashMap<&str, &Tensor>,
        used: &mut usize,
    ) -> Result<()> {
        if let Node::Layer(layer) = self {
            for (name, param) in layer.parameters_mut() {
                let path = join(prefix, name);
                let value = lookup
                    .get(path.as_str())
                    .ok_or_else(|| Error::MissingParameter(path.clone()))?;
                if value.shape() != param.shape() {
                    return Err(Error::ShapeMismatch {
                        expected: param.shape().to_vec(),
                        got: value.shape().to_vec(),
                    });
                }
                *param = (*value).clone();
                *used += 1;
            }
            return Ok(());
        }
        for (name, child) in self.children_mut() {
            child.assign_parameters(&join(prefix, name), lookup, used)?;
        }
        Ok(())
    }

    /// Every quantizer in the tree, depth first
    pub fn quantizers(&self) -> Vec<&Quantizer> {
        match self {
            Node::Quant(q) => vec![q],
            _ => self
                .children()
                .iter()
                .flat_map(|(_, child)| child.quantizers())
                .collect(),
        }
    }

    /// True while any calibrated quantizer is still observing
    pub fn is_calibrating(&self) -> bool {
        self.quantizers().iter().any(|q| q.is_calibrating())
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let (open, children) = match self {
            Node::Sequential(seq) => ("Sequential", seq.children()),
            Node::Module(m) => (m.type_name(), m.children()),
            Node::Layer(layer) => return write!(f, "{layer}"),
            Node::Quant(q) => return write!(f, "{q}"),
        };
        if children.is_empty() {
            return write!(f, "{open}()");
        }
        writeln!(f, "{open}(")?;
        let pad = "  ".repeat(indent + 1);
        for (name, child) in children {
            write!(f, "{pad}({name}): ")?;
            child.fmt_tree(f, indent + 1)?;
            writeln!(f)?;
        }
        write!(f, "{})", "  ".repeat(indent))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

impl From<Sequential> for Node {
    fn from(seq: Sequential) -> Self {
        Node::Sequential(seq)
    }
}

impl From<Module> for Node {
    fn from(m: Module) -> Self {
        Node::Module(m)
    }
}

impl From<Layer> for Node {
    fn from(layer: Layer) -> Self {
        Node::Layer(layer)
    }
}

impl From<Quantizer> for Node {
    fn from(q: Quantizer) -> Self {
        Node::Quant(q)
    }
}
