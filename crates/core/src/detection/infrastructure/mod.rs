pub mod detector_factory;
pub mod image_tensor;
pub mod onnx_landmark_net;
pub mod onnx_tiny_face_detector;
