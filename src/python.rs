//! Python bindings

use crate::core::{
    CloudePottier, Decomposition, GeneralWishart, HAlphaPlane, HAlphaWishart, PolClassifier, WishartConfig,
};
use crate::io::{DualPolBands, QuadPolBands};
use crate::types::{LabelImage, MatrixKind, SarError, SarRealImage};
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;

fn to_py_err(e: SarError) -> PyErr {
    match e {
        SarError::InvalidConfig(_) | SarError::InvalidFormat(_) => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
        }
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)),
    }
}

fn owned_bands(bands: Vec<PyReadonlyArray2<'_, f32>>) -> Vec<SarRealImage> {
    bands.iter().map(|b| b.as_array().to_owned()).collect()
}

fn parse_plane(plane: &str) -> PyResult<HAlphaPlane> {
    match plane.to_lowercase().as_str() {
        "standard" => Ok(HAlphaPlane::Standard),
        "lee" => Ok(HAlphaPlane::Lee),
        _ => Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
            "Invalid H-Alpha plane: {}",
            plane
        ))),
    }
}

/// H-Alpha Wishart classification of a C2, C3 or T3 band stack
#[pyfunction]
#[pyo3(signature = (bands, kind, window_size=5, max_iterations=3, plane="standard", no_data=0.0))]
fn h_alpha_wishart<'py>(
    py: Python<'py>,
    bands: Vec<PyReadonlyArray2<'py, f32>>,
    kind: &str,
    window_size: usize,
    max_iterations: usize,
    plane: &str,
    no_data: f32,
) -> PyResult<&'py PyArray2<u32>> {
    let kind: MatrixKind = kind.parse().map_err(to_py_err)?;
    let config = WishartConfig {
        window_size,
        max_iterations,
        h_alpha_plane: parse_plane(plane)?,
        ..Default::default()
    };
    let bands = owned_bands(bands);

    let labels: LabelImage = py
        .allow_threads(|| match kind {
            MatrixKind::C2 => {
                let source = DualPolBands::with_no_data(bands, no_data)?;
                HAlphaWishart::<_, 2>::new(source, config)?.classify()
            }
            MatrixKind::C3 | MatrixKind::T3 => {
                let source = QuadPolBands::with_no_data(kind, bands, no_data)?;
                HAlphaWishart::<_, 3>::new(source, config)?.classify()
            }
        })
        .map_err(to_py_err)?;

    Ok(labels.into_pyarray(py))
}

/// Cloude-Pottier zone classification of a C2, C3 or T3 band stack
#[pyfunction]
#[pyo3(signature = (bands, kind, window_size=5, plane="standard", no_data=0.0))]
fn cloude_pottier<'py>(
    py: Python<'py>,
    bands: Vec<PyReadonlyArray2<'py, f32>>,
    kind: &str,
    window_size: usize,
    plane: &str,
    no_data: f32,
) -> PyResult<&'py PyArray2<u32>> {
    let kind: MatrixKind = kind.parse().map_err(to_py_err)?;
    let config = WishartConfig {
        window_size,
        h_alpha_plane: parse_plane(plane)?,
        ..Default::default()
    };
    let bands = owned_bands(bands);

    let labels: LabelImage = py
        .allow_threads(|| match kind {
            MatrixKind::C2 => {
                let source = DualPolBands::with_no_data(bands, no_data)?;
                CloudePottier::<_, 2>::new(source, config)?.classify()
            }
            MatrixKind::C3 | MatrixKind::T3 => {
                let source = QuadPolBands::with_no_data(kind, bands, no_data)?;
                CloudePottier::<_, 3>::new(source, config)?.classify()
            }
        })
        .map_err(to_py_err)?;

    Ok(labels.into_pyarray(py))
}

/// General Wishart classification of a C3 or T3 band stack
#[pyfunction]
#[pyo3(signature = (
    bands,
    kind,
    decomposition="Freeman-Durden Decomposition",
    window_size=5,
    max_iterations=3,
    num_initial_classes=90,
    num_final_classes=15,
    mixed_category_threshold=0.5,
    no_data=0.0
))]
#[allow(clippy::too_many_arguments)]
fn general_wishart<'py>(
    py: Python<'py>,
    bands: Vec<PyReadonlyArray2<'py, f32>>,
    kind: &str,
    decomposition: &str,
    window_size: usize,
    max_iterations: usize,
    num_initial_classes: usize,
    num_final_classes: usize,
    mixed_category_threshold: f64,
    no_data: f32,
) -> PyResult<&'py PyArray2<u32>> {
    let kind: MatrixKind = kind.parse().map_err(to_py_err)?;
    let config = WishartConfig {
        window_size,
        max_iterations,
        num_initial_classes,
        num_final_classes,
        mixed_category_threshold,
        decomposition: Decomposition::from_name(decomposition).map_err(to_py_err)?,
        ..Default::default()
    };
    let bands = owned_bands(bands);

    let labels: LabelImage = py
        .allow_threads(|| {
            let source = QuadPolBands::with_no_data(kind, bands, no_data)?;
            GeneralWishart::new(source, config)?.classify()
        })
        .map_err(to_py_err)?;

    Ok(labels.into_pyarray(py))
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(cloude_pottier, m)?)?;
    m.add_function(wrap_pyfunction!(h_alpha_wishart, m)?)?;
    m.add_function(wrap_pyfunction!(general_wishart, m)?)?;
    Ok(())
}
