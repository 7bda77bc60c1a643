pub mod asset_downloader;
pub mod execution_provider;
pub mod file_asset_fetcher;
pub mod http_asset_fetcher;
pub mod onnx_bundle_loader;
pub mod onnx_graph;
pub mod origin_asset_fetcher;
pub mod tfjs_converter;
