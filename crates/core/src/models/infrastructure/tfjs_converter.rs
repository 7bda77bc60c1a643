//! Rebuilds the published face-api weight sets as ONNX models.
//!
//! The CDN ships each network as a manifest plus raw (mostly uint8
//! quantized) tensors in TensorFlow.js layout. The graphs below reproduce
//! both architectures in NCHW so `ort` can run them.

use thiserror::Error;

use crate::models::domain::model_bundle::ModelBundle;
use crate::models::domain::weights_manifest::{NamedWeights, WeightTensor};

use super::onnx_graph::{Attr, Dim, GraphBuilder};

/// Input side of the landmark network.
pub const LANDMARK_INPUT_SIZE: i64 = 112;
pub const LANDMARK_OUTPUTS: i64 = 136;

const LEAKY_ALPHA: f32 = 0.1;
const DENSE_BLOCKS: [&str; 4] = ["dense0", "dense1", "dense2", "dense3"];

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("weight {0} is missing")]
    Missing(String),
    #[error("weight {name} has shape {actual:?}, expected {expected}")]
    Shape {
        name: String,
        actual: Vec<usize>,
        expected: &'static str,
    },
}

/// Serialized ONNX model for `bundle` built from its decoded weights.
pub fn convert(bundle: ModelBundle, weights: &NamedWeights) -> Result<Vec<u8>, ConvertError> {
    let graph = match bundle {
        ModelBundle::TinyFaceDetector => tiny_face_detector(weights)?,
        ModelBundle::FaceLandmark68 => face_landmark_68(weights)?,
    };
    Ok(graph.encode())
}

#[derive(Clone, Copy)]
enum Padding {
    Valid,
    Same,
    /// Zero padding of one pixel on every side.
    One,
}

impl Padding {
    fn attr(self) -> (&'static str, Attr) {
        match self {
            Padding::Valid => ("pads", Attr::Ints(vec![0, 0, 0, 0])),
            Padding::Same => ("auto_pad", Attr::Str("SAME_UPPER")),
            Padding::One => ("pads", Attr::Ints(vec![1, 1, 1, 1])),
        }
    }
}

struct Converter<'a> {
    weights: &'a NamedWeights,
    graph: GraphBuilder,
}

impl<'a> Converter<'a> {
    fn new(name: &str, weights: &'a NamedWeights) -> Self {
        Self {
            weights,
            graph: GraphBuilder::new(name),
        }
    }

    fn has(&self, name: &str) -> bool {
        self.weights.contains_key(name)
    }

    fn weight(&self, name: &str, rank: usize, expected: &'static str) -> Result<&'a WeightTensor, ConvertError> {
        let tensor = self
            .weights
            .get(name)
            .ok_or_else(|| ConvertError::Missing(name.to_string()))?;
        if tensor.shape.len() != rank {
            return Err(ConvertError::Shape {
                name: name.to_string(),
                actual: tensor.shape.clone(),
                expected,
            });
        }
        Ok(tensor)
    }

    fn bias(&mut self, name: &str) -> Result<String, ConvertError> {
        let b = self.weight(name, 1, "[out]")?;
        Ok(self
            .graph
            .initializer(name, vec![b.shape[0] as i64], b.values.clone()))
    }

    /// Regular convolution from `[kh, kw, in, out]` filters plus bias.
    fn conv(&mut self, prefix: &str, x: &str, stride: i64, padding: Padding) -> Result<String, ConvertError> {
        let name = format!("{prefix}/filters");
        let f = self.weight(&name, 4, "[kh, kw, in, out]")?;
        let (kh, kw, cin, cout) = (f.shape[0], f.shape[1], f.shape[2], f.shape[3]);
        let filters = self.graph.initializer(
            &name,
            vec![cout as i64, cin as i64, kh as i64, kw as i64],
            hwio_to_oihw(&f.values, kh, kw, cin, cout),
        );
        let bias = self.bias(&format!("{prefix}/bias"))?;
        Ok(self.graph.node(
            "Conv",
            &[x, &filters, &bias],
            vec![
                ("kernel_shape", Attr::Ints(vec![kh as i64, kw as i64])),
                ("strides", Attr::Ints(vec![stride, stride])),
                padding.attr(),
            ],
        ))
    }

    /// Depthwise convolution followed by a pointwise one carrying the bias.
    fn separable(&mut self, prefix: &str, x: &str, stride: i64, padding: Padding) -> Result<String, ConvertError> {
        let dw_name = format!("{prefix}/depthwise_filter");
        let dw = self.weight(&dw_name, 4, "[kh, kw, channels, 1]")?;
        let (kh, kw, channels) = (dw.shape[0], dw.shape[1], dw.shape[2]);
        if dw.shape[3] != 1 {
            return Err(ConvertError::Shape {
                name: dw_name,
                actual: dw.shape.clone(),
                expected: "[kh, kw, channels, 1]",
            });
        }
        let depthwise = self.graph.initializer(
            &dw_name,
            vec![channels as i64, 1, kh as i64, kw as i64],
            hwio_to_oihw(&dw.values, kh, kw, channels, 1),
        );
        let depth_out = self.graph.node(
            "Conv",
            &[x, &depthwise],
            vec![
                ("group", Attr::Int(channels as i64)),
                ("kernel_shape", Attr::Ints(vec![kh as i64, kw as i64])),
                ("strides", Attr::Ints(vec![stride, stride])),
                padding.attr(),
            ],
        );

        let pw_name = format!("{prefix}/pointwise_filter");
        let pw = self.weight(&pw_name, 4, "[1, 1, in, out]")?;
        let (cin, cout) = (pw.shape[2], pw.shape[3]);
        let pointwise = self.graph.initializer(
            &pw_name,
            vec![cout as i64, cin as i64, 1, 1],
            hwio_to_oihw(&pw.values, 1, 1, cin, cout),
        );
        let bias = self.bias(&format!("{prefix}/bias"))?;
        Ok(self.graph.node(
            "Conv",
            &[&depth_out, &pointwise, &bias],
            vec![
                ("kernel_shape", Attr::Ints(vec![1, 1])),
                ("strides", Attr::Ints(vec![1, 1])),
            ],
        ))
    }

    fn leaky(&mut self, x: &str) -> String {
        self.graph
            .node("LeakyRelu", &[x], vec![("alpha", Attr::Float(LEAKY_ALPHA))])
    }

    fn relu(&mut self, x: &str) -> String {
        self.graph.node("Relu", &[x], vec![])
    }

    fn add(&mut self, a: &str, b: &str) -> String {
        self.graph.node("Add", &[a, b], vec![])
    }

    fn max_pool(&mut self, x: &str, stride: i64) -> String {
        self.graph.node(
            "MaxPool",
            &[x],
            vec![
                ("kernel_shape", Attr::Ints(vec![2, 2])),
                ("strides", Attr::Ints(vec![stride, stride])),
                ("auto_pad", Attr::Str("SAME_UPPER")),
            ],
        )
    }
}

/// Reorders `[kh, kw, in, out]` into `[out, in, kh, kw]`.
fn hwio_to_oihw(values: &[f32], kh: usize, kw: usize, cin: usize, cout: usize) -> Vec<f32> {
    let mut out = vec![0.0; values.len()];
    for y in 0..kh {
        for x in 0..kw {
            for i in 0..cin {
                for o in 0..cout {
                    out[((o * cin + i) * kh + y) * kw + x] = values[((y * kw + x) * cin + i) * cout + o];
                }
            }
        }
    }
    out
}

/// MobileNet-style tiny YOLOv2: a 3x3 conv, five separable convs each
/// followed by a 2x2 max pool, optional conv6/conv7, and a 1x1 head.
/// Input `[1, 3, H, W]`, output `[1, 25, H/32, W/32]`.
fn tiny_face_detector(weights: &NamedWeights) -> Result<GraphBuilder, ConvertError> {
    let mut c = Converter::new("tiny_face_detector", weights);
    let input = c.graph.input(
        "input",
        vec![Dim::Fixed(1), Dim::Fixed(3), Dim::Named("height"), Dim::Named("width")],
    );

    let conv0 = c.conv("conv0", &input, 1, Padding::Valid)?;
    let mut out = c.leaky(&conv0);
    out = c.max_pool(&out, 2);
    for layer in 1..=5 {
        let sep = c.separable(&format!("conv{layer}"), &out, 1, Padding::One)?;
        out = c.leaky(&sep);
        out = c.max_pool(&out, if layer < 5 { 2 } else { 1 });
    }
    for layer in ["conv6", "conv7"] {
        if c.has(&format!("{layer}/depthwise_filter")) {
            let sep = c.separable(layer, &out, 1, Padding::One)?;
            out = c.leaky(&sep);
        }
    }
    let head = c.conv("conv8", &out, 1, Padding::Valid)?;
    c.graph.output(
        &head,
        vec![Dim::Fixed(1), Dim::Fixed(25), Dim::Named("grid_h"), Dim::Named("grid_w")],
    );
    Ok(c.graph)
}

/// Four densely connected blocks on a 112px crop, 7x7 average pooling
/// and a fully connected layer producing 68 relative `(x, y)` pairs.
fn face_landmark_68(weights: &NamedWeights) -> Result<GraphBuilder, ConvertError> {
    let mut c = Converter::new("face_landmark_68", weights);
    let mut out = c.graph.input(
        "input",
        vec![
            Dim::Fixed(1),
            Dim::Fixed(3),
            Dim::Fixed(LANDMARK_INPUT_SIZE),
            Dim::Fixed(LANDMARK_INPUT_SIZE),
        ],
    );

    for (i, block) in DENSE_BLOCKS.iter().enumerate() {
        let first = if i == 0 {
            c.conv(&format!("{block}/conv0"), &out, 2, Padding::Same)?
        } else {
            c.separable(&format!("{block}/conv0"), &out, 2, Padding::Same)?
        };
        let out1 = c.relu(&first);
        let out2 = c.separable(&format!("{block}/conv1"), &out1, 1, Padding::Same)?;
        let sum12 = c.add(&out1, &out2);
        let in3 = c.relu(&sum12);
        let out3 = c.separable(&format!("{block}/conv2"), &in3, 1, Padding::Same)?;
        let sum23 = c.add(&out2, &out3);
        let sum123 = c.add(&out1, &sum23);
        let in4 = c.relu(&sum123);
        let out4 = c.separable(&format!("{block}/conv3"), &in4, 1, Padding::Same)?;
        let sum34 = c.add(&out3, &out4);
        let sum234 = c.add(&out2, &sum34);
        let sum1234 = c.add(&out1, &sum234);
        out = c.relu(&sum1234);
    }

    let pooled = c.graph.node(
        "AveragePool",
        &[&out],
        vec![
            ("kernel_shape", Attr::Ints(vec![7, 7])),
            ("strides", Attr::Ints(vec![2, 2])),
        ],
    );
    let flat = c
        .graph
        .node("Flatten", &[&pooled], vec![("axis", Attr::Int(1))]);
    let fc = c.weight("fc/weights", 2, "[in, out]")?;
    let fc_weights = c.graph.initializer(
        "fc/weights",
        fc.shape.iter().map(|&d| d as i64).collect(),
        fc.values.clone(),
    );
    let fc_bias = c.bias("fc/bias")?;
    let landmarks = c.graph.node("Gemm", &[&flat, &fc_weights, &fc_bias], vec![]);
    c.graph
        .output(&landmarks, vec![Dim::Fixed(1), Dim::Fixed(LANDMARK_OUTPUTS)]);
    Ok(c.graph)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::infrastructure::onnx_graph::tests::op_types;

    fn tensor(shape: &[usize]) -> WeightTensor {
        let n: usize = shape.iter().product();
        WeightTensor {
            shape: shape.to_vec(),
            values: (0..n).map(|i| ((i % 7) as f32 - 3.0) * 0.01).collect(),
        }
    }

    fn add_separable(w: &mut NamedWeights, prefix: &str, cin: usize, cout: usize) {
        w.insert(format!("{prefix}/depthwise_filter"), tensor(&[3, 3, cin, 1]));
        w.insert(format!("{prefix}/pointwise_filter"), tensor(&[1, 1, cin, cout]));
        w.insert(format!("{prefix}/bias"), tensor(&[cout]));
    }

    /// Weight set with the published tiny face detector's layer shapes.
    pub(crate) fn tiny_face_detector_weights() -> NamedWeights {
        let sizes = [3, 16, 32, 64, 128, 256, 512];
        let mut w = NamedWeights::new();
        w.insert("conv0/filters".into(), tensor(&[3, 3, 3, 16]));
        w.insert("conv0/bias".into(), tensor(&[16]));
        for layer in 1..=5 {
            add_separable(&mut w, &format!("conv{layer}"), sizes[layer], sizes[layer + 1]);
        }
        w.insert("conv8/filters".into(), tensor(&[1, 1, 512, 25]));
        w.insert("conv8/bias".into(), tensor(&[25]));
        w
    }

    /// Weight set with the published 68-point landmark net's layer shapes.
    pub(crate) fn face_landmark_68_weights() -> NamedWeights {
        let mut w = NamedWeights::new();
        let mut cin = 3;
        for (block, cout) in DENSE_BLOCKS.iter().zip([32, 64, 128, 256]) {
            if cin == 3 {
                w.insert(format!("{block}/conv0/filters"), tensor(&[3, 3, 3, cout]));
                w.insert(format!("{block}/conv0/bias"), tensor(&[cout]));
            } else {
                add_separable(&mut w, &format!("{block}/conv0"), cin, cout);
            }
            for conv in ["conv1", "conv2", "conv3"] {
                add_separable(&mut w, &format!("{block}/{conv}"), cout, cout);
            }
            cin = cout;
        }
        w.insert("fc/weights".into(), tensor(&[256, 136]));
        w.insert("fc/bias".into(), tensor(&[136]));
        w
    }

    #[test]
    fn test_hwio_to_oihw_moves_output_channel_first() {
        // kh = kw = 1, in = 2, out = 3: value = 10 * in + out
        let hwio = vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0];
        assert_eq!(
            hwio_to_oihw(&hwio, 1, 1, 2, 3),
            vec![0.0, 10.0, 1.0, 11.0, 2.0, 12.0]
        );
    }

    #[test]
    fn test_tiny_face_detector_layer_sequence() {
        let bytes = convert(ModelBundle::TinyFaceDetector, &tiny_face_detector_weights()).unwrap();
        let ops = op_types(&bytes);
        assert_eq!(ops.iter().filter(|o| *o == "MaxPool").count(), 6);
        assert_eq!(ops.iter().filter(|o| *o == "LeakyRelu").count(), 6);
        // conv0, five depthwise + pointwise pairs, conv8
        assert_eq!(ops.iter().filter(|o| *o == "Conv").count(), 12);
        assert_eq!(ops.last().map(String::as_str), Some("Conv"));
    }

    #[test]
    fn test_optional_conv6_conv7_are_used_when_present() {
        let mut w = tiny_face_detector_weights();
        add_separable(&mut w, "conv6", 512, 1024);
        add_separable(&mut w, "conv7", 1024, 1024);
        w.insert("conv8/filters".into(), tensor(&[1, 1, 1024, 25]));
        let bytes = convert(ModelBundle::TinyFaceDetector, &w).unwrap();
        assert_eq!(op_types(&bytes).iter().filter(|o| *o == "LeakyRelu").count(), 8);
    }

    #[test]
    fn test_face_landmark_68_layer_sequence() {
        let bytes = convert(ModelBundle::FaceLandmark68, &face_landmark_68_weights()).unwrap();
        let ops = op_types(&bytes);
        assert_eq!(ops.iter().filter(|o| *o == "Add").count(), 4 * 6);
        assert_eq!(ops.iter().filter(|o| *o == "Relu").count(), 4 * 4);
        assert_eq!(&ops[ops.len() - 3..], &["AveragePool", "Flatten", "Gemm"]);
    }

    #[test]
    fn test_missing_weight_is_named() {
        let mut w = face_landmark_68_weights();
        w.remove("dense2/conv1/pointwise_filter");
        let err = convert(ModelBundle::FaceLandmark68, &w).unwrap_err();
        assert_eq!(err.to_string(), "weight dense2/conv1/pointwise_filter is missing");
    }

    #[test]
    fn test_wrong_rank_is_rejected() {
        let mut w = tiny_face_detector_weights();
        w.insert("conv0/filters".into(), tensor(&[27, 16]));
        assert!(matches!(
            convert(ModelBundle::TinyFaceDetector, &w),
            Err(ConvertError::Shape { .. })
        ));
    }
}
