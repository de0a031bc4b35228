//! Bundled inference sample.
//!
//! Two rows of the 30 real-valued features the classifier is trained on,
//! kept here so `deploy` and the end-to-end run can exercise the endpoint
//! without an input file.

use crate::platform::InferenceRequest;

/// Number of features per input row.
pub const FEATURE_COUNT: usize = 30;

/// Returns the bundled two-row inference batch.
pub fn sample_inputs() -> InferenceRequest {
    InferenceRequest::new(vec![
        vec![
            1.371e1, 2.083e1, 9.020e1, 5.779e2, 1.189e-1, 1.645e-1, 9.366e-2, 5.985e-2, 2.196e-1,
            7.451e-2, 5.835e-1, 1.377e0, 3.856e0, 5.096e1, 8.805e-3, 3.029e-2, 2.488e-2, 1.448e-2,
            1.486e-2, 5.412e-3, 1.706e1, 2.814e1, 1.106e2, 8.970e2, 1.654e-1, 3.682e-1, 2.678e-1,
            1.556e-1, 3.196e-1, 1.151e-1,
        ],
        vec![
            1.308e1, 1.571e1, 8.563e1, 5.200e2, 1.075e-1, 1.270e-1, 4.568e-2, 3.110e-2, 1.967e-1,
            6.811e-2, 1.852e-1, 7.477e-1, 1.383e0, 1.467e1, 4.097e-3, 1.898e-2, 1.698e-2, 6.490e-3,
            1.678e-2, 2.425e-3, 1.450e1, 2.049e1, 9.609e1, 6.305e2, 1.312e-1, 2.776e-1, 1.890e-1,
            7.283e-2, 3.184e-1, 8.183e-2,
        ],
    ])
}
