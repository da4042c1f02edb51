//! Activation quantizer insertion

use super::{Node, NodeKind, Sequential};
use crate::quant::ActivationQuantConfig;
use crate::Result;

/// Copy of `model` with an activation quantizer after every recognized layer
///
/// Inside a [`Sequential`], a recognized leaf `k` is followed by a new child
/// named `{k}_{scheme}_quant` holding a quantizer named `{k}_quant`. Children
/// of a [`Module`](super::Module) are rewritten in place, so a recognized leaf
/// sitting directly in a module is left without a quantizer. A bare leaf is
/// returned unchanged.
///
/// # Errors
/// `InvalidBits` / `InvalidOverflowRate` from the config, checked before the
/// walk starts.
pub fn duplicate_model_with_quant(model: Node, config: &ActivationQuantConfig) -> Result<Node> {
    config.validate()?;
    let out = rewrite(model, config)?;
    tracing::info!(
        quantizers = out.quantizers().len(),
        scheme = %config.scheme,
        bits = config.bits,
        "activation quantizers inserted"
    );
    Ok(out)
}

fn rewrite(node: Node, config: &ActivationQuantConfig) -> Result<Node> {
    match node.kind() {
        NodeKind::Container => rewrite_container(node, config),
        NodeKind::RecognizedLeaf | NodeKind::OtherLeaf => Ok(node),
    }
}

fn rewrite_container(node: Node, config: &ActivationQuantConfig) -> Result<Node> {
    match node {
        Node::Sequential(seq) => {
            let mut out = Sequential::new();
            for (name, child) in seq.into_children() {
                match child.kind() {
                    NodeKind::RecognizedLeaf => {
                        let quant = config.build(format!("{name}_quant"))?;
                        let slot = format!("{name}_{}_quant", config.scheme);
                        tracing::debug!(layer = %name, quantizer = %quant, "inserting quantizer");
                        out.push(name, child);
                        out.push(slot, quant);
                    }
                    NodeKind::Container | NodeKind::OtherLeaf => {
                        out.push(name, rewrite(child, config)?);
                    }
                }
            }
            Ok(Node::Sequential(out))
        }
        Node::Module(mut module) => {
            let children = std::mem::take(module.children_mut());
            for (name, child) in children {
                let child = rewrite(child, config)?;
                module.children_mut().push((name, child));
            }
            Ok(Node::Module(module))
        }
        leaf @ (Node::Layer(_) | Node::Quant(_)) => Ok(leaf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{BatchNorm, Conv2d, Forward, Layer, Linear, Module, Pool2d};
    use crate::quant::{QuantScheme, Quantizer, StatelessKernel};
    use crate::Error;

    fn child_names(node: &Node) -> Vec<&str> {
        node.children().iter().map(|(n, _)| n.as_str()).collect()
    }

    fn cnn() -> Node {
        Sequential::new()
            .add("0", Layer::Conv2d(Conv2d::zeros(1, 2, 3, 1, 1).unwrap()))
            .add("1", Layer::ReLU)
            .add("2", Layer::MaxPool2d(Pool2d::new(2)))
            .add("3", Layer::Flatten)
            .add("4", Layer::Linear(Linear::zeros(8, 3).unwrap()))
            .into()
    }

    #[test]
    fn test_quantizer_after_recognized_layers() {
        let config = ActivationQuantConfig::new(8, 0.0, 2, QuantScheme::Linear);
        let out = duplicate_model_with_quant(cnn(), &config).unwrap();
        assert_eq!(
            child_names(&out),
            vec!["0", "0_linear_quant", "1", "2", "3", "4", "4_linear_quant"]
        );
        let names: Vec<&str> = out.quantizers().iter().map(|q| q.name()).collect();
        assert_eq!(names, vec!["0_quant", "4_quant"]);
        assert!(out.is_calibrating());
    }

    #[test]
    fn test_stateless_scheme_names() {
        let config = ActivationQuantConfig::new(4, 0.0, 2, QuantScheme::MinMaxLog);
        let out = duplicate_model_with_quant(cnn(), &config).unwrap();
        assert_eq!(child_names(&out)[1], "0_minmax_log_quant");
        match &out.children()[1].1 {
            Node::Quant(Quantizer::Stateless(q)) => {
                assert_eq!(q.kernel(), StatelessKernel::LogMinMax);
                assert_eq!(q.bits(), 4);
            }
            other => panic!("expected stateless quantizer, got {other}"),
        }
        assert!(!out.is_calibrating());
    }

    #[test]
    fn test_nested_containers() {
        let model: Node = Module::new("Net", Forward::Chain)
            .add(
                "features",
                Sequential::new()
                    .add("0", Layer::Conv2d(Conv2d::zeros(1, 1, 1, 1, 0).unwrap()))
                    .add("1", Layer::AvgPool2d(Pool2d::new(2))),
            )
            .add("bn", Layer::BatchNorm1d(BatchNorm::identity(1)))
            .into();
        let config = ActivationQuantConfig::new(8, 0.0, 1, QuantScheme::Tanh);
        let out = duplicate_model_with_quant(model, &config).unwrap();

        // module children keep their names; the module's own leaf gets no quantizer
        assert_eq!(child_names(&out), vec!["features", "bn"]);
        let features = &out.children()[0].1;
        assert_eq!(
            child_names(features),
            vec!["0", "0_tanh_quant", "1", "1_tanh_quant"]
        );
        assert_eq!(out.quantizers().len(), 2);
    }

    #[test]
    fn test_leaf_returned_unchanged() {
        let config = ActivationQuantConfig::default();
        let out = duplicate_model_with_quant(Layer::ReLU.into(), &config).unwrap();
        assert!(matches!(out, Node::Layer(Layer::ReLU)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ActivationQuantConfig::new(0, 0.0, 1, QuantScheme::Linear);
        assert!(matches!(
            duplicate_model_with_quant(cnn(), &config),
            Err(Error::InvalidBits(0))
        ));
    }

    #[test]
    fn test_parameters_preserved() {
        let config = ActivationQuantConfig::default();
        let before = cnn().named_parameters();
        let after = duplicate_model_with_quant(cnn(), &config)
            .unwrap()
            .named_parameters();
        assert_eq!(before, after);
    }
}
