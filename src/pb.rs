//! Generated gRPC/protobuf types, compiled by `build.rs` from `proto/`.

pub mod coordinator {
    tonic::include_proto!("coordinator");
}

pub mod worker {
    tonic::include_proto!("worker");
}
