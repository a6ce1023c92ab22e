//! Helper macros for driver binaries.

/// Create a directory and all of its parents, panicking on failure.
#[macro_export]
macro_rules! mkdir {
    ( $dir:expr ) => {
        std::fs::create_dir_all(&$dir)
            .unwrap_or_else(|err| {
                panic!("couldn't create directory {:?}: {}", $dir, err)
            })
    }
}

/// Write arrays to a NumPy `.npz` archive, panicking on failure.
///
/// Expected usage:
/// ```ignore
/// write_npz!(
///     path,
///     arrays: {
///         "time" => &time,
///         "data" => &data,
///     }
/// );
/// ```
#[macro_export]
macro_rules! write_npz {
    ( $path:expr, arrays: { $( $name:expr => $arr:expr ),+ $(,)? } ) => {
        {
            let mut npz
                = ndarray_npy::NpzWriter::new(
                    std::fs::File::create(&$path)
                        .unwrap_or_else(|err| {
                            panic!("couldn't create file {:?}: {}",
                                $path, err)
                        })
                );
            $(
                npz.add_array($name, $arr)
                    .unwrap_or_else(|err| {
                        panic!("error writing array '{}': {}", $name, err)
                    });
            )+
            npz.finish()
                .unwrap_or_else(|err| {
                    panic!("error finalizing npz file: {}", err)
                });
        }
    }
}
