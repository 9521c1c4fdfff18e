//! Typed reads and writes of datasets in the current group.
//!
//! Getters resolve the name, check type class and shape against the
//! requested host type, read the whole payload and, for tensors of rank 2
//! and above, reorder it into the configured host order. `set` always
//! replaces: an existing child of the same name is unlinked first, so the
//! new value may differ in type and shape.

use std::borrow::Cow;
use std::rc::Rc;

use ndarray::{Array, Array2, ArrayBase, ArrayD, Data, Dimension, IxDyn, ShapeBuilder};
use rustyhdf5_engine::{Engine, Hid, ReadBuffer, Shape, TypeClass, WriteBuffer};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::handle::HandleGuard;
use crate::layout::{HostOrder, LayoutConverter};
use crate::options::{ScalarLayout, SessionOptions};
use crate::probe::{DatasetDescriptor, TypeProbe};

/// Attribute key written by `set_description`.
pub const DESCRIPTION_KEY: &str = "description";
/// Attribute key written by `set_units`.
pub const UNITS_KEY: &str = "units";

/// Row-major payload of a value about to be written.
#[derive(Debug, Clone, PartialEq)]
pub enum Elements<'a> {
    Integer(Vec<i64>),
    Float(Cow<'a, [f64]>),
    Text(Vec<&'a str>),
}

impl Elements<'_> {
    /// Type class the elements are stored as.
    pub fn class(&self) -> TypeClass {
        match self {
            Elements::Integer(_) => TypeClass::Integer,
            Elements::Float(_) => TypeClass::Float,
            Elements::Text(_) => TypeClass::String,
        }
    }

    fn as_write_buffer(&self) -> WriteBuffer<'_> {
        match self {
            Elements::Integer(v) => WriteBuffer::Integer(v),
            Elements::Float(v) => WriteBuffer::Float(v),
            Elements::Text(v) => WriteBuffer::Text(v),
        }
    }
}

/// A host value that can be stored as a dataset.
pub trait StoreValue {
    /// Dataspace the value is written with.
    fn shape(&self, layout: ScalarLayout) -> Shape;

    /// Elements in engine (row-major) order.
    fn elements(&self) -> Result<Elements<'_>>;
}

fn single(layout: ScalarLayout) -> Shape {
    match layout {
        ScalarLayout::Rank1 => Shape::vector(1),
        ScalarLayout::Scalar => Shape::Scalar,
    }
}

impl StoreValue for i32 {
    fn shape(&self, layout: ScalarLayout) -> Shape {
        single(layout)
    }

    fn elements(&self) -> Result<Elements<'_>> {
        Ok(Elements::Integer(vec![i64::from(*self)]))
    }
}

impl StoreValue for f64 {
    fn shape(&self, layout: ScalarLayout) -> Shape {
        single(layout)
    }

    fn elements(&self) -> Result<Elements<'_>> {
        Ok(Elements::Float(Cow::Owned(vec![*self])))
    }
}

impl StoreValue for str {
    fn shape(&self, layout: ScalarLayout) -> Shape {
        single(layout)
    }

    fn elements(&self) -> Result<Elements<'_>> {
        Ok(Elements::Text(vec![self]))
    }
}

impl StoreValue for String {
    fn shape(&self, layout: ScalarLayout) -> Shape {
        self.as_str().shape(layout)
    }

    fn elements(&self) -> Result<Elements<'_>> {
        self.as_str().elements()
    }
}

impl StoreValue for [f64] {
    fn shape(&self, _layout: ScalarLayout) -> Shape {
        Shape::vector(self.len() as u64)
    }

    fn elements(&self) -> Result<Elements<'_>> {
        Ok(Elements::Float(Cow::Borrowed(self)))
    }
}

impl StoreValue for Vec<f64> {
    fn shape(&self, layout: ScalarLayout) -> Shape {
        self.as_slice().shape(layout)
    }

    fn elements(&self) -> Result<Elements<'_>> {
        self.as_slice().elements()
    }
}

/// Any `f64` array. Rank 0 is stored with a scalar dataspace.
impl<S, D> StoreValue for ArrayBase<S, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    fn shape(&self, _layout: ScalarLayout) -> Shape {
        if self.ndim() == 0 {
            return Shape::Scalar;
        }
        Shape::Simple(self.shape().iter().map(|&n| n as u64).collect())
    }

    fn elements(&self) -> Result<Elements<'_>> {
        if let Some(row_major) = self.as_slice() {
            return Ok(Elements::Float(Cow::Borrowed(row_major)));
        }
        if self.ndim() >= 2 && self.t().is_standard_layout() {
            if let Some(col_major) = self.as_slice_memory_order() {
                let engine = LayoutConverter::new(HostOrder::ColumnMajor)
                    .to_engine_order(col_major, self.shape())?;
                return Ok(Elements::Float(Cow::Owned(engine)));
            }
        }
        Ok(Elements::Float(Cow::Owned(self.iter().copied().collect())))
    }
}

impl<T: StoreValue + ?Sized> StoreValue for &T {
    fn shape(&self, layout: ScalarLayout) -> Shape {
        (**self).shape(layout)
    }

    fn elements(&self) -> Result<Elements<'_>> {
        (**self).elements()
    }
}

/// Typed transfer dispatcher for one session.
pub struct TypedIo<E: Engine> {
    engine: Rc<E>,
    options: SessionOptions,
    last_written: Option<HandleGuard<E>>,
}

impl<E: Engine> TypedIo<E> {
    /// Dispatcher applying `options` to every transfer.
    pub fn new(engine: Rc<E>, options: SessionOptions) -> Self {
        Self {
            engine,
            options,
            last_written: None,
        }
    }

    /// Options applied to every transfer.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn probe(&self, group: Hid) -> TypeProbe<'_, E> {
        TypeProbe::new(&self.engine, group)
    }

    /// Open `name` and check it holds `class`.
    fn open_checked(
        &self,
        group: Hid,
        name: &str,
        class: TypeClass,
    ) -> Result<(HandleGuard<E>, Shape)> {
        let probe = self.probe(group);
        let dataset = probe.open_dataset(name)?;
        let found = self.engine.dataset_type_class(dataset.raw())?;
        if found != class {
            return Err(Error::TypeMismatch {
                name: name.to_string(),
                expected: class,
                found,
            });
        }
        let shape = probe.shape_of(&dataset)?;
        Ok((dataset, shape))
    }

    fn element_count(name: &str, shape: &Shape) -> Result<usize> {
        shape
            .element_count()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| shape_mismatch(name, "addressable size", shape))
    }

    fn read_single(
        &self,
        group: Hid,
        name: &str,
        class: TypeClass,
    ) -> Result<(HandleGuard<E>, Shape)> {
        let (dataset, shape) = self.open_checked(group, name, class)?;
        if shape.element_count() != Some(1) {
            return Err(shape_mismatch(name, "exactly one element", &shape));
        }
        Ok((dataset, shape))
    }

    fn read_floats(&self, dataset: &HandleGuard<E>, count: usize) -> Result<Vec<f64>> {
        let mut buf = vec![0.0; count];
        self.engine
            .dataset_read(dataset.raw(), ReadBuffer::Float(&mut buf))?;
        Ok(buf)
    }

    // -- getters -------------------------------------------------------------

    /// Read a one-element integer dataset into an `i32`.
    pub fn get_int(&self, group: Hid, name: &str) -> Result<i32> {
        let (dataset, _) = self.read_single(group, name, TypeClass::Integer)?;
        let mut buf = [0i64; 1];
        self.engine
            .dataset_read(dataset.raw(), ReadBuffer::Integer(&mut buf))?;
        trace!(name, value = buf[0], "read int");
        i32::try_from(buf[0]).map_err(|_| Error::OutOfRange {
            name: name.to_string(),
            value: buf[0],
            target: "i32",
        })
    }

    /// Read a one-element float dataset.
    pub fn get_double(&self, group: Hid, name: &str) -> Result<f64> {
        let (dataset, _) = self.read_single(group, name, TypeClass::Float)?;
        let buf = self.read_floats(&dataset, 1)?;
        trace!(name, value = buf[0], "read double");
        Ok(buf[0])
    }

    /// Read a one-element string dataset.
    pub fn get_string(&self, group: Hid, name: &str) -> Result<String> {
        let (dataset, shape) = self.read_single(group, name, TypeClass::String)?;
        self.read_first_string(&dataset, &shape)
    }

    /// Element 0 of a string dataset of any non-zero size; the remaining
    /// elements are discarded.
    pub fn get_string_first(&self, group: Hid, name: &str) -> Result<String> {
        let (dataset, shape) = self.open_checked(group, name, TypeClass::String)?;
        if shape.element_count() == Some(0) {
            return Err(shape_mismatch(name, "at least one element", &shape));
        }
        self.read_first_string(&dataset, &shape)
    }

    /// Every element of a string dataset in row-major order.
    pub fn get_strings(&self, group: Hid, name: &str) -> Result<Vec<String>> {
        let (dataset, shape) = self.open_checked(group, name, TypeClass::String)?;
        if shape.is_scalar() {
            return Ok(vec![self.read_scalar_string(&dataset)?]);
        }
        let mut out = Vec::new();
        self.engine
            .dataset_read(dataset.raw(), ReadBuffer::TextArray(&mut out))?;
        Ok(out)
    }

    fn read_first_string(&self, dataset: &HandleGuard<E>, shape: &Shape) -> Result<String> {
        if shape.is_scalar() {
            return self.read_scalar_string(dataset);
        }
        let mut all = Vec::new();
        self.engine
            .dataset_read(dataset.raw(), ReadBuffer::TextArray(&mut all))?;
        Ok(all.into_iter().next().unwrap_or_default())
    }

    /// One NUL-terminated buffer sized from the storage footprint.
    fn read_scalar_string(&self, dataset: &HandleGuard<E>) -> Result<String> {
        let size = self.engine.dataset_storage_size(dataset.raw())?;
        let mut buf = vec![0u8; size as usize];
        self.engine
            .dataset_read(dataset.raw(), ReadBuffer::Text(&mut buf))?;
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    /// Read a rank-1 float dataset. `[1, n]` and `[n, 1]` are accepted too.
    pub fn get_vector(&self, group: Hid, name: &str) -> Result<Vec<f64>> {
        let (dataset, shape) = self.open_checked(group, name, TypeClass::Float)?;
        let vector_like = match shape.extents() {
            [_] => true,
            [rows, cols] => *rows == 1 || *cols == 1,
            _ => false,
        };
        if !vector_like {
            return Err(shape_mismatch(name, "rank 1", &shape));
        }
        let count = Self::element_count(name, &shape)?;
        let out = self.read_floats(&dataset, count)?;
        trace!(name, len = out.len(), "read vector");
        Ok(out)
    }

    /// Read a rank-2 float dataset.
    pub fn get_matrix(&self, group: Hid, name: &str) -> Result<Array2<f64>> {
        self.get_array(group, name)
    }

    /// Read a float tensor. The rank must equal `D::NDIM`; `IxDyn` accepts
    /// any rank. The result is laid out in the configured host order.
    pub fn get_array<D: Dimension>(&self, group: Hid, name: &str) -> Result<Array<f64, D>> {
        let (dataset, shape) = self.open_checked(group, name, TypeClass::Float)?;
        if let Some(rank) = D::NDIM {
            if shape.rank() != rank {
                return Err(shape_mismatch(name, &format!("rank {rank}"), &shape));
            }
        }
        let extents = shape
            .extents()
            .iter()
            .map(|&n| usize::try_from(n))
            .collect::<std::result::Result<Vec<usize>, _>>()
            .map_err(|_| shape_mismatch(name, "addressable extents", &shape))?;
        let count = Self::element_count(name, &shape)?;
        let row_major = self.read_floats(&dataset, count)?;

        let order = self.options.host_order;
        let host = LayoutConverter::new(order).to_host_order(&row_major, &extents)?;
        let column_major = order == HostOrder::ColumnMajor;
        let array = ArrayD::from_shape_vec(IxDyn(&extents).set_f(column_major), host)
            .map_err(|_| shape_mismatch(name, "consistent extents", &shape))?;
        trace!(name, %shape, ?order, "read array");
        array
            .into_dimensionality::<D>()
            .map_err(|_| shape_mismatch(name, "requested dimensionality", &shape))
    }

    // -- metadata ------------------------------------------------------------

    /// Type class of the dataset `name`.
    pub fn type_class(&self, group: Hid, name: &str) -> Result<TypeClass> {
        let dataset = self.probe(group).open_dataset(name)?;
        Ok(self.engine.dataset_type_class(dataset.raw())?)
    }

    /// Kind, type class and shape of the dataset `name`.
    pub fn describe(&self, group: Hid, name: &str) -> Result<DatasetDescriptor> {
        self.probe(group).describe(name)
    }

    /// A string attribute of the dataset `name`, `None` if unset.
    pub fn attribute(&self, group: Hid, name: &str, key: &str) -> Result<Option<String>> {
        let dataset = self.probe(group).open_dataset(name)?;
        Ok(self.engine.attr_read_string(dataset.raw(), key)?)
    }

    // -- writes --------------------------------------------------------------

    /// Store `value` as `name`, replacing any existing child.
    ///
    /// The existing child is unlinked before the new dataset is created. If
    /// creating or writing the new dataset fails, `name` is left absent: the
    /// old value is gone and a half-created dataset is unlinked again.
    pub fn set<V: StoreValue>(&mut self, group: Hid, name: &str, value: V) -> Result<()> {
        self.release_last_written()?;
        let shape = value.shape(self.options.scalar_layout);
        let elements = value.elements()?;
        if self.engine.link_exists(group, name)? {
            debug!(name, "replacing existing child");
            self.engine.link_delete(group, name)?;
        }
        let space = HandleGuard::dataspace(&self.engine, self.engine.dataspace_create(&shape)?);
        let raw = self
            .engine
            .dataset_create(group, name, elements.class(), space.raw())?;
        let mut dataset = HandleGuard::dataset(&self.engine, raw);
        if let Err(e) = self
            .engine
            .dataset_write(dataset.raw(), elements.as_write_buffer())
        {
            if let Err(release) = dataset.release() {
                warn!(name, error = %release, "failed to release unwritten dataset");
            }
            if let Err(unlink) = self.engine.link_delete(group, name) {
                warn!(name, error = %unlink, "failed to unlink unwritten dataset");
            }
            return Err(e.into());
        }
        trace!(name, %shape, class = %elements.class(), "wrote dataset");
        self.last_written = Some(dataset);
        Ok(())
    }

    /// Set the description attribute of the last written dataset. `None` does nothing.
    pub fn set_description(&self, description: Option<&str>) -> Result<()> {
        self.set_last_attribute(DESCRIPTION_KEY, description)
    }

    /// Set the units attribute of the last written dataset. `None` does nothing.
    pub fn set_units(&self, units: Option<&str>) -> Result<()> {
        self.set_last_attribute(UNITS_KEY, units)
    }

    fn set_last_attribute(&self, key: &str, value: Option<&str>) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        let dataset = self.last_written.as_ref().ok_or(Error::NothingWritten)?;
        self.engine.attr_write_string(dataset.raw(), key, value)?;
        Ok(())
    }

    /// Close the most recently written dataset.
    pub fn release_last_written(&mut self) -> Result<()> {
        if let Some(mut dataset) = self.last_written.take() {
            dataset.release()?;
        }
        Ok(())
    }
}

fn shape_mismatch(name: &str, expected: &str, found: &Shape) -> Error {
    Error::ShapeMismatch {
        name: name.to_string(),
        expected: expected.to_string(),
        found: found.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use ndarray::{array, Array3, ArrayD, Ix1, Ix2, ShapeBuilder};
    use rustyhdf5_engine::MemoryEngine;

    use super::*;

    struct Fixture {
        engine: Rc<MemoryEngine>,
        file: HandleGuard<MemoryEngine>,
        root: HandleGuard<MemoryEngine>,
        io: TypedIo<MemoryEngine>,
    }

    fn fixture(options: SessionOptions) -> Fixture {
        let engine = Rc::new(MemoryEngine::volatile());
        let file = HandleGuard::file(&engine, engine.file_create(Path::new("io.rh5")).unwrap());
        let root = HandleGuard::group(&engine, engine.group_open_root(file.raw()).unwrap());
        let io = TypedIo::new(Rc::clone(&engine), options);
        Fixture {
            engine,
            file,
            root,
            io,
        }
    }

    // -----------------------------------------------------------------------
    // Value encoding
    // -----------------------------------------------------------------------

    #[test]
    fn scalar_shapes_follow_layout() {
        assert_eq!(7i32.shape(ScalarLayout::Rank1), Shape::vector(1));
        assert_eq!(7i32.shape(ScalarLayout::Scalar), Shape::Scalar);
        assert_eq!("s".shape(ScalarLayout::Rank1), Shape::vector(1));
        assert_eq!(vec![1.0, 2.0].shape(ScalarLayout::Scalar), Shape::vector(2));
        assert_eq!(
            StoreValue::shape(&ndarray::arr0(1.0), ScalarLayout::Rank1),
            Shape::Scalar
        );
    }

    #[test]
    fn fortran_arrays_encode_row_major() {
        let c = array![[1.0, 2.0, 3.0], [11.0, 22.0, 33.0]];
        let f = Array2::from_shape_vec((2, 3).f(), vec![1.0, 11.0, 2.0, 22.0, 3.0, 33.0]).unwrap();
        assert_eq!(c, f);
        let expected = vec![1.0, 2.0, 3.0, 11.0, 22.0, 33.0];
        assert_eq!(c.elements().unwrap(), Elements::Float(Cow::Owned(expected.clone())));
        assert_eq!(f.elements().unwrap(), Elements::Float(Cow::Owned(expected.clone())));
        // strided view, neither C nor F contiguous
        let wide = array![[1.0, 0.0, 2.0, 0.0, 3.0], [11.0, 0.0, 22.0, 0.0, 33.0]];
        let view = wide.slice(ndarray::s![.., ..;2]);
        assert_eq!(view.elements().unwrap(), Elements::Float(Cow::Owned(expected)));
    }

    // -----------------------------------------------------------------------
    // Round trips
    // -----------------------------------------------------------------------

    #[test]
    fn scalars_roundtrip() {
        let mut fx = fixture(SessionOptions::default());
        let g = fx.root.raw();
        fx.io.set(g, "n", 23).unwrap();
        fx.io.set(g, "x", 24.5).unwrap();
        fx.io.set(g, "text", "hello").unwrap();
        assert_eq!(fx.io.get_int(g, "n").unwrap(), 23);
        assert_eq!(fx.io.get_double(g, "x").unwrap(), 24.5);
        assert_eq!(fx.io.get_string(g, "text").unwrap(), "hello");
        assert_eq!(fx.io.describe(g, "n").unwrap().shape, Shape::vector(1));
    }

    #[test]
    fn scalar_dataspace_roundtrip() {
        let opts = SessionOptions::default().with_scalar_layout(ScalarLayout::Scalar);
        let mut fx = fixture(opts);
        let g = fx.root.raw();
        fx.io.set(g, "n", -5).unwrap();
        fx.io.set(g, "text", String::from("scalar text")).unwrap();
        fx.io.set(g, "empty", "").unwrap();
        assert_eq!(fx.io.describe(g, "n").unwrap().shape, Shape::Scalar);
        assert_eq!(fx.io.get_int(g, "n").unwrap(), -5);
        assert_eq!(fx.io.get_string(g, "text").unwrap(), "scalar text");
        assert_eq!(fx.io.get_string(g, "empty").unwrap(), "");
        assert_eq!(fx.io.get_strings(g, "text").unwrap(), vec!["scalar text"]);
    }

    #[test]
    fn matrix_roundtrip_in_both_orders() {
        for order in [HostOrder::ColumnMajor, HostOrder::RowMajor] {
            let mut fx = fixture(SessionOptions::default().with_host_order(order));
            let g = fx.root.raw();
            let m = array![[1.0, 2.0, 3.0], [11.0, 22.0, 33.0]];
            fx.io.set(g, "m", &m).unwrap();
            let back = fx.io.get_matrix(g, "m").unwrap();
            assert_eq!(back, m);
            assert_eq!(back[[1, 1]], 22.0);
            assert_eq!(back[[1, 2]], 33.0);
            let col_major = order == HostOrder::ColumnMajor;
            assert_eq!(back.t().is_standard_layout(), col_major);
        }
    }

    #[test]
    fn tensors_roundtrip() {
        let mut fx = fixture(SessionOptions::default());
        let g = fx.root.raw();
        let t = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 100 + j * 10 + k) as f64);
        fx.io.set(g, "t", &t).unwrap();
        assert_eq!(fx.io.get_array::<ndarray::Ix3>(g, "t").unwrap(), t);
        let dynamic: ArrayD<f64> = fx.io.get_array::<IxDyn>(g, "t").unwrap();
        assert_eq!(dynamic.shape(), &[2, 3, 4]);
        assert_eq!(dynamic[&[1usize, 2, 3][..]], 123.0);
    }

    #[test]
    fn vectors_accept_unit_axes() {
        let mut fx = fixture(SessionOptions::default());
        let g = fx.root.raw();
        fx.io.set(g, "v", vec![1.0, 2.0, 3.0]).unwrap();
        fx.io.set(g, "row", array![[1.0, 2.0, 3.0]]).unwrap();
        fx.io.set(g, "col", array![[1.0], [2.0], [3.0]]).unwrap();
        fx.io.set(g, "empty", Vec::<f64>::new()).unwrap();
        for name in ["v", "row", "col"] {
            assert_eq!(fx.io.get_vector(g, name).unwrap(), vec![1.0, 2.0, 3.0]);
        }
        assert!(fx.io.get_vector(g, "empty").unwrap().is_empty());
        assert_eq!(fx.io.get_array::<Ix1>(g, "v").unwrap(), array![1.0, 2.0, 3.0]);
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn type_and_shape_mismatch() {
        let mut fx = fixture(SessionOptions::default());
        let g = fx.root.raw();
        fx.io.set(g, "pi", 2.75).unwrap();
        fx.io.set(g, "three", 3).unwrap();
        fx.io.set(g, "six", vec![1.0; 6]).unwrap();
        assert!(matches!(fx.io.get_int(g, "pi"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(fx.io.get_double(g, "three"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(fx.io.get_double(g, "six"), Err(Error::ShapeMismatch { .. })));
        assert!(matches!(fx.io.get_array::<Ix2>(g, "six"), Err(Error::ShapeMismatch { .. })));
        assert!(matches!(fx.io.get_int(g, "nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn set_replaces_with_new_shape_and_type() {
        let mut fx = fixture(SessionOptions::default());
        let g = fx.root.raw();
        fx.io.set(g, "v", vec![1.0, 2.0]).unwrap();
        fx.io.set(g, "v", array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap();
        assert_eq!(fx.io.describe(g, "v").unwrap().extents(), &[3, 2]);
        fx.io.set(g, "v", "now text").unwrap();
        assert_eq!(fx.io.type_class(g, "v").unwrap(), TypeClass::String);
        assert_eq!(fx.io.get_string(g, "v").unwrap(), "now text");
    }

    /// Declares more elements than it yields, so the engine rejects the write.
    struct Truncated;

    impl StoreValue for Truncated {
        fn shape(&self, _layout: ScalarLayout) -> Shape {
            Shape::vector(3)
        }

        fn elements(&self) -> Result<Elements<'_>> {
            Ok(Elements::Float(Cow::Owned(vec![1.0, 2.0])))
        }
    }

    /// Fails before anything reaches the engine.
    struct Unencodable;

    impl StoreValue for Unencodable {
        fn shape(&self, _layout: ScalarLayout) -> Shape {
            Shape::vector(1)
        }

        fn elements(&self) -> Result<Elements<'_>> {
            Err(Error::BufferLength {
                expected: 1,
                found: 0,
            })
        }
    }

    #[test]
    fn failed_write_leaves_no_dataset() {
        let mut fx = fixture(SessionOptions::default());
        let g = fx.root.raw();
        fx.io.set(g, "v", vec![9.0]).unwrap();
        let err = fx.io.set(g, "v", Truncated).unwrap_err();
        assert!(matches!(
            err,
            Error::Engine(rustyhdf5_engine::EngineError::BufferSize { .. })
        ));
        assert!(!fx.engine.link_exists(g, "v").unwrap());
        // no zero-filled leftover and no stray handle: file and root only
        assert_eq!(fx.engine.file_object_count(fx.file.raw()).unwrap(), 2);
        assert!(matches!(fx.io.set_units(Some("m")), Err(Error::NothingWritten)));
    }

    #[test]
    fn encoding_failure_keeps_old_value() {
        let mut fx = fixture(SessionOptions::default());
        let g = fx.root.raw();
        fx.io.set(g, "v", vec![9.0]).unwrap();
        assert!(matches!(
            fx.io.set(g, "v", Unencodable),
            Err(Error::BufferLength { .. })
        ));
        assert_eq!(fx.io.get_vector(g, "v").unwrap(), vec![9.0]);
    }

    #[test]
    fn overflowing_extents_are_a_shape_mismatch() {
        let huge = Shape::Simple(vec![1 << 32, 1 << 32]);
        assert!(matches!(
            TypedIo::<MemoryEngine>::element_count("big", &huge),
            Err(Error::ShapeMismatch { .. })
        ));
        assert_eq!(TypedIo::<MemoryEngine>::element_count("ok", &Shape::vector(4)).unwrap(), 4);
    }

    // -----------------------------------------------------------------------
    // Attributes / handles
    // -----------------------------------------------------------------------

    #[test]
    fn attributes_target_last_written() {
        let mut fx = fixture(SessionOptions::default());
        let g = fx.root.raw();
        assert!(matches!(fx.io.set_units(Some("m")), Err(Error::NothingWritten)));
        fx.io.set_units(None).unwrap();
        fx.io.set(g, "a", 1.0).unwrap();
        fx.io.set(g, "b", 2.0).unwrap();
        fx.io.set_description(Some("second")).unwrap();
        fx.io.set_units(Some("m/s")).unwrap();
        fx.io.set_units(None).unwrap();
        assert_eq!(fx.io.attribute(g, "b", UNITS_KEY).unwrap().as_deref(), Some("m/s"));
        assert_eq!(fx.io.attribute(g, "b", DESCRIPTION_KEY).unwrap().as_deref(), Some("second"));
        assert_eq!(fx.io.attribute(g, "a", UNITS_KEY).unwrap(), None);
    }

    #[test]
    fn only_last_written_stays_open() {
        let mut fx = fixture(SessionOptions::default());
        let g = fx.root.raw();
        fx.io.set(g, "a", 1).unwrap();
        fx.io.set(g, "b", 2).unwrap();
        let _ = fx.io.get_int(g, "a").unwrap();
        // file, root, last written dataset
        assert_eq!(fx.engine.file_object_count(fx.file.raw()).unwrap(), 3);
        fx.io.release_last_written().unwrap();
        assert_eq!(fx.engine.file_object_count(fx.file.raw()).unwrap(), 2);
    }
}
