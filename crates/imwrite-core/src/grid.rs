use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

/// Generate a grid of voxel indices for the given spatial shape.
///
/// Returns a tensor of shape `[N, D]` where N is the total number of voxels
/// and D is `shape.len()`. Rows follow row-major order over `shape` and
/// column `a` holds the index along axis `a`.
pub fn generate_grid<B: Backend>(shape: &[usize], device: &B::Device) -> Tensor<B, 2> {
    let total: usize = shape.iter().product();
    let rank = shape.len();
    let grid = index_grid(shape);
    Tensor::<B, 1>::from_data(
        TensorData::new(grid, Shape::new([total * rank])).convert::<B::FloatElem>(),
        device,
    )
    .reshape([total, rank])
}

/// Flattened `[N, D]` index grid in row-major order.
pub(crate) fn index_grid(shape: &[usize]) -> Vec<f64> {
    let total: usize = shape.iter().product();
    let rank = shape.len();
    let mut grid = Vec::with_capacity(total * rank);
    let mut index = vec![0usize; rank];
    for _ in 0..total {
        grid.extend(index.iter().map(|&i| i as f64));
        for a in (0..rank).rev() {
            index[a] += 1;
            if index[a] < shape[a] {
                break;
            }
            index[a] = 0;
        }
    }
    grid
}

/// Row-major strides of `shape`.
pub(crate) fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for a in (0..shape.len().saturating_sub(1)).rev() {
        strides[a] = strides[a + 1] * shape[a + 1];
    }
    strides
}
