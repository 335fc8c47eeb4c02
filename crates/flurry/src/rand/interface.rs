/// A trait for random sources that return random integers.
///
/// Workers only draw from it to pick a backoff delay, so neither quality nor
/// speed matter much. The abstraction exists so tests can pin the delay.
///
/// # Example
/// ```
/// use flurry::RandSource;
///
/// struct FixedRand;
/// impl RandSource<u64> for FixedRand {
///     fn rand(&self) -> u64 {
///         1234
///     }
/// }
///
/// let rng = FixedRand;
/// assert_eq!(rng.rand(), 1234);
/// ```
pub trait RandSource<T> {
    /// Returns a random integer.
    fn rand(&self) -> T;
}
