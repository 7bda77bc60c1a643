//! Builds ONNX `ModelProto` bytes for small feed-forward graphs.
//!
//! Only the message fields the converters need are written. Field numbers
//! follow `onnx.proto` (proto2 wire format).

const IR_VERSION: i64 = 7;
const OPSET_VERSION: i64 = 13;
const PRODUCER: &str = "facetrack";

/// `TensorProto.DataType.FLOAT`
const DATA_TYPE_FLOAT: i64 = 1;

const ATTR_FLOAT: i64 = 1;
const ATTR_INT: i64 = 2;
const ATTR_STRING: i64 = 3;
const ATTR_INTS: i64 = 7;

const WIRE_VARINT: u64 = 0;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

#[derive(Default)]
struct ProtoWriter {
    buf: Vec<u8>,
}

impl ProtoWriter {
    fn varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    fn key(&mut self, field: u32, wire: u64) {
        self.varint(((field as u64) << 3) | wire);
    }

    fn int64(&mut self, field: u32, value: i64) {
        self.key(field, WIRE_VARINT);
        self.varint(value as u64);
    }

    fn float(&mut self, field: u32, value: f32) {
        self.key(field, WIRE_FIXED32);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn bytes(&mut self, field: u32, data: &[u8]) {
        self.key(field, WIRE_LEN);
        self.varint(data.len() as u64);
        self.buf.extend_from_slice(data);
    }

    fn string(&mut self, field: u32, value: &str) {
        self.bytes(field, value.as_bytes());
    }

    fn message(&mut self, field: u32, build: impl FnOnce(&mut ProtoWriter)) {
        let mut inner = ProtoWriter::default();
        build(&mut inner);
        self.bytes(field, &inner.buf);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Attr {
    Int(i64),
    Ints(Vec<i64>),
    Float(f32),
    Str(&'static str),
}

/// Static size or a named symbolic dimension.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Dim {
    Fixed(i64),
    Named(&'static str),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub op_type: &'static str,
    pub inputs: Vec<String>,
    pub output: String,
    pub attrs: Vec<(&'static str, Attr)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Initializer {
    pub name: String,
    pub dims: Vec<i64>,
    pub values: Vec<f32>,
}

/// Accumulates nodes and f32 initializers, then serializes one model.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    name: String,
    nodes: Vec<Node>,
    initializers: Vec<Initializer>,
    inputs: Vec<(String, Vec<Dim>)>,
    outputs: Vec<(String, Vec<Dim>)>,
}

impl GraphBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn input(&mut self, name: &str, dims: Vec<Dim>) -> String {
        self.inputs.push((name.to_string(), dims));
        name.to_string()
    }

    pub fn output(&mut self, name: &str, dims: Vec<Dim>) {
        self.outputs.push((name.to_string(), dims));
    }

    pub fn initializer(&mut self, name: &str, dims: Vec<i64>, values: Vec<f32>) -> String {
        self.initializers.push(Initializer {
            name: name.to_string(),
            dims,
            values,
        });
        name.to_string()
    }

    /// Appends a node and returns the name of its single output.
    pub fn node(
        &mut self,
        op_type: &'static str,
        inputs: &[&str],
        attrs: Vec<(&'static str, Attr)>,
    ) -> String {
        let output = format!("{}_{}", op_type.to_ascii_lowercase(), self.nodes.len());
        self.nodes.push(Node {
            op_type,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            output: output.clone(),
            attrs,
        });
        output
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn initializers(&self) -> &[Initializer] {
        &self.initializers
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut model = ProtoWriter::default();
        model.int64(1, IR_VERSION);
        model.string(2, PRODUCER);
        model.message(7, |graph| self.write_graph(graph));
        model.message(8, |opset| {
            opset.string(1, "");
            opset.int64(2, OPSET_VERSION);
        });
        model.buf
    }

    fn write_graph(&self, graph: &mut ProtoWriter) {
        for (i, node) in self.nodes.iter().enumerate() {
            graph.message(1, |n| {
                for input in &node.inputs {
                    n.string(1, input);
                }
                n.string(2, &node.output);
                n.string(3, &format!("{}_{i}", node.op_type));
                n.string(4, node.op_type);
                for (name, attr) in &node.attrs {
                    n.message(5, |a| write_attr(a, name, attr));
                }
            });
        }
        graph.string(2, &self.name);
        for init in &self.initializers {
            graph.message(5, |t| {
                for &d in &init.dims {
                    t.int64(1, d);
                }
                t.int64(2, DATA_TYPE_FLOAT);
                t.string(8, &init.name);
                let raw: Vec<u8> = init.values.iter().flat_map(|v| v.to_le_bytes()).collect();
                t.bytes(9, &raw);
            });
        }
        for (name, dims) in &self.inputs {
            graph.message(11, |v| write_value_info(v, name, dims));
        }
        for (name, dims) in &self.outputs {
            graph.message(12, |v| write_value_info(v, name, dims));
        }
    }
}

fn write_attr(a: &mut ProtoWriter, name: &str, attr: &Attr) {
    a.string(1, name);
    match attr {
        Attr::Float(f) => {
            a.float(2, *f);
            a.int64(20, ATTR_FLOAT);
        }
        Attr::Int(i) => {
            a.int64(3, *i);
            a.int64(20, ATTR_INT);
        }
        Attr::Str(s) => {
            a.string(4, s);
            a.int64(20, ATTR_STRING);
        }
        Attr::Ints(values) => {
            for &v in values {
                a.int64(8, v);
            }
            a.int64(20, ATTR_INTS);
        }
    }
}

fn write_value_info(v: &mut ProtoWriter, name: &str, dims: &[Dim]) {
    v.string(1, name);
    v.message(2, |ty| {
        ty.message(1, |tensor| {
            tensor.int64(1, DATA_TYPE_FLOAT);
            tensor.message(2, |shape| {
                for dim in dims {
                    shape.message(1, |d| match dim {
                        Dim::Fixed(n) => d.int64(1, *n),
                        Dim::Named(p) => d.string(2, p),
                    });
                }
            });
        });
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Reads one varint at `pos`.
    fn read_varint(data: &[u8], pos: &mut usize) -> u64 {
        let mut value = 0u64;
        let mut shift = 0;
        loop {
            let byte = data[*pos];
            *pos += 1;
            value |= ((byte & 0x7f) as u64) << shift;
            if byte < 0x80 {
                return value;
            }
            shift += 7;
        }
    }

    /// Top-level `(field, payload)` pairs of a message; varints and fixed32
    /// values are returned as their raw bytes.
    pub(crate) fn fields(data: &[u8]) -> Vec<(u32, Vec<u8>)> {
        let mut pos = 0;
        let mut out = Vec::new();
        while pos < data.len() {
            let key = read_varint(data, &mut pos);
            let field = (key >> 3) as u32;
            let payload = match key & 7 {
                WIRE_VARINT => {
                    let start = pos;
                    read_varint(data, &mut pos);
                    data[start..pos].to_vec()
                }
                WIRE_LEN => {
                    let len = read_varint(data, &mut pos) as usize;
                    pos += len;
                    data[pos - len..pos].to_vec()
                }
                WIRE_FIXED32 => {
                    pos += 4;
                    data[pos - 4..pos].to_vec()
                }
                other => panic!("unexpected wire type {other}"),
            };
            out.push((field, payload));
        }
        out
    }

    pub(crate) fn field(data: &[u8], number: u32) -> Vec<Vec<u8>> {
        fields(data)
            .into_iter()
            .filter(|(f, _)| *f == number)
            .map(|(_, p)| p)
            .collect()
    }

    /// `op_type` of every node in a serialized model, in graph order.
    pub(crate) fn op_types(model: &[u8]) -> Vec<String> {
        let graph = &field(model, 7)[0];
        field(graph, 1)
            .iter()
            .map(|node| String::from_utf8(field(node, 4)[0].clone()).unwrap())
            .collect()
    }

    #[test]
    fn test_varint_encoding() {
        let mut w = ProtoWriter::default();
        w.varint(1);
        w.varint(300);
        assert_eq!(w.buf, vec![0x01, 0xac, 0x02]);
    }

    #[test]
    fn test_negative_int64_is_ten_bytes() {
        let mut w = ProtoWriter::default();
        w.int64(1, -1);
        assert_eq!(w.buf.len(), 11);
        assert_eq!(w.buf[0], 0x08);
    }

    #[test]
    fn test_model_header_and_opset() {
        let mut g = GraphBuilder::new("tiny");
        let x = g.input("x", vec![Dim::Fixed(1), Dim::Named("n")]);
        let y = g.node("Relu", &[&x], vec![]);
        g.output(&y, vec![Dim::Fixed(1), Dim::Named("n")]);
        let bytes = g.encode();

        // ir_version is the first field of a ModelProto.
        assert_eq!(&bytes[..2], &[0x08, IR_VERSION as u8]);
        let opset = &field(&bytes, 8)[0];
        assert_eq!(field(opset, 2)[0], vec![OPSET_VERSION as u8]);
        assert_eq!(op_types(&bytes), vec!["Relu"]);
    }

    #[test]
    fn test_node_wiring_and_initializer_payload() {
        let mut g = GraphBuilder::new("affine");
        let x = g.input("x", vec![Dim::Fixed(2)]);
        let b = g.initializer("b", vec![2], vec![1.0, -1.0]);
        let y = g.node("Add", &[&x, &b], vec![("alpha", Attr::Float(0.5))]);
        g.output(&y, vec![Dim::Fixed(2)]);
        assert_eq!(y, "add_0");

        let bytes = g.encode();
        let graph = &field(&bytes, 7)[0];
        let node = &field(graph, 1)[0];
        assert_eq!(field(node, 1), vec![b"x".to_vec(), b"b".to_vec()]);
        assert_eq!(field(node, 2), vec![b"add_0".to_vec()]);

        let init = &field(graph, 5)[0];
        let raw = &field(init, 9)[0];
        assert_eq!(raw.len(), 8);
        assert_eq!(f32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]), -1.0);
        assert_eq!(field(graph, 12).len(), 1);
    }
}
