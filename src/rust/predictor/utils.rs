use ndarray::{ArrayView1, ArrayViewMut2};

/// Index of the largest value; the first one wins on ties. NaNs never win.
pub(crate) fn argmax(values: ArrayView1<f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i).or(if values.is_empty() { None } else { Some(0) })
}

pub(crate) fn relu_inplace(mut values: ArrayViewMut2<f32>) {
    values.mapv_inplace(|x| x.max(0.0));
}
