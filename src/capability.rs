use core::marker::PhantomData;
use derive_more::Debug;

/// A generator that produces values with no input.
///
/// A tree calls `produce` once per activation, either from its pull loop or
/// from a manual `push_once`. Returning `None` ends the activation without
/// propagating anything.
pub trait Source<T>: Send {
    /// Produce the next value, if any.
    fn produce(&mut self) -> Option<T>;
}

/// A mapping from one input value to one output value.
///
/// The input is a read-only view of the value owned by the parent's fan-out;
/// sibling transforms may read it concurrently. Returning `None` prunes the
/// subtree below this node for the current activation.
pub trait Transform<In, Out>: Send + Sync {
    /// Map `input` to an output, if any.
    fn apply(&self, input: &In) -> Option<Out>;
}

impl<T> Source<T> for Box<dyn Source<T>> {
    fn produce(&mut self) -> Option<T> {
        (**self).produce()
    }
}

impl<In, Out> Transform<In, Out> for Box<dyn Transform<In, Out>> {
    fn apply(&self, input: &In) -> Option<Out> {
        (**self).apply(input)
    }
}

/// `Source` backed by a closure. Built by [`fn_source`].
#[derive(Debug)]
pub struct FnSource<F> {
    #[debug(skip)]
    generator: F,
}

impl<T, F> Source<T> for FnSource<F>
where
    F: FnMut() -> Option<T> + Send,
{
    fn produce(&mut self) -> Option<T> {
        (self.generator)()
    }
}

/// `Transform` backed by a closure. Built by [`fn_transform`].
#[derive(Debug)]
pub struct FnTransform<F, In, Out> {
    #[debug(skip)]
    mapping: F,
    #[debug(skip)]
    _marker: PhantomData<fn(&In) -> Option<Out>>,
}

impl<In, Out, F> Transform<In, Out> for FnTransform<F, In, Out>
where
    F: Fn(&In) -> Option<Out> + Send + Sync,
{
    fn apply(&self, input: &In) -> Option<Out> {
        (self.mapping)(input)
    }
}

/// Wrap a stateless or closure-captured generator as a [`Source`].
pub fn fn_source<T, F>(generator: F) -> FnSource<F>
where
    F: FnMut() -> Option<T> + Send,
{
    FnSource { generator }
}

/// Wrap a mapping closure as a [`Transform`].
pub fn fn_transform<In, Out, F>(mapping: F) -> FnTransform<F, In, Out>
where
    F: Fn(&In) -> Option<Out> + Send + Sync,
{
    FnTransform {
        mapping,
        _marker: PhantomData,
    }
}
