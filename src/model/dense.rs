use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    tensor::{activation::leaky_relu, backend::Backend, Tensor},
};

/// Configuration for a two-layer dense stack
#[derive(Debug, Clone)]
pub struct DenseStackConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub output_size: usize,
}

impl DenseStackConfig {
    pub fn new(input_size: usize, hidden_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            hidden_size,
            output_size,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DenseStack<B> {
        DenseStack {
            hidden: LinearConfig::new(self.input_size, self.hidden_size).init(device),
            output: LinearConfig::new(self.hidden_size, self.output_size).init(device),
        }
    }
}

/// Linear -> leaky ReLU -> Linear
#[derive(Module, Debug)]
pub struct DenseStack<B: Backend> {
    pub hidden: Linear<B>,
    pub output: Linear<B>,
}

impl<B: Backend> DenseStack<B> {
    /// Forward: [batch, input] -> [batch, output]. A slope of 0 is a plain ReLU.
    pub fn forward(&self, x: Tensor<B, 2>, negative_slope: f64) -> Tensor<B, 2> {
        let x = self.hidden.forward(x);
        let x = leaky_relu(x, negative_slope);
        self.output.forward(x)
    }
}
