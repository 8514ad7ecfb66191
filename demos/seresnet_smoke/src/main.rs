//! End-to-end shape smoke check: build a default SE-ResNet-50 and run one
//! synthetic batch through it.

use burn::backend::NdArray;
use burn::prelude::{Backend, Tensor};
use burn::tensor::Distribution;
use burn_seresnet::models::resnet::resnet_model::{ResNet, ResNetConfig};

fn main() {
    type B = NdArray<f32>;
    let device = Default::default();
    B::seed(0);

    let num_classes = 10;
    let model: ResNet<B> = ResNetConfig::resnet50(num_classes)
        .with_se(true)
        .init(&device);

    let input = Tensor::<B, 4>::random([1, 3, 32, 32], Distribution::Normal(0.0, 1.0), &device);
    let logits = model.forward(input);

    println!("logits shape: {:?}", logits.shape().dims);
    println!("logits: {}", logits);
}
