use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn, Pat};

/// Automatically profile a function when the `perf_stats` feature is enabled.
///
/// The function body is wrapped with a drop guard that logs the elapsed
/// time through `tracing::info!` when it exceeds the threshold. The guard is
/// emitted under `#[cfg(feature = "perf_stats")]`, so it compiles to nothing
/// in crates built without the feature.
///
/// # Features
/// - Auto-detects a `req: &PathRequest` (or `req: PathRequest`) parameter and
///   includes the request endpoints in the log line
/// - Logs when duration > threshold (default 1ms)
///
/// # Example
/// ```ignore
/// #[profile]
/// fn process_request(shared: &WorkerShared, req: PathRequest) {
///     // ... work ...
/// }
/// ```
///
/// # Optional Parameters
/// ```ignore
/// #[profile(5)]  // Custom threshold in milliseconds
/// fn expensive_function() { ... }
/// ```
#[proc_macro_attribute]
pub fn profile(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);

    let threshold_ms: u128 = if attr.is_empty() {
        1
    } else {
        attr.to_string().trim().parse().unwrap_or(1)
    };

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let fn_name_str = sig.ident.to_string();

    let has_request_param = sig.inputs.iter().any(|arg| {
        if let FnArg::Typed(pat_type) = arg {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                if pat_ident.ident == "req" {
                    let ty = &pat_type.ty;
                    let type_str = quote!(#ty).to_string();
                    return type_str.contains("PathRequest");
                }
            }
        }
        false
    });

    let profile_guard_def = if has_request_param {
        quote! {
            struct ProfileGuard {
                name: &'static str,
                start: std::time::Instant,
                endpoints: (i32, i32, i32, i32),
            }
            impl Drop for ProfileGuard {
                fn drop(&mut self) {
                    let elapsed = self.start.elapsed();
                    if elapsed.as_millis() > #threshold_ms {
                        let (sx, sy, gx, gy) = self.endpoints;
                        ::tracing::info!(
                            "[PERF] {} ({},{})->({},{}): {:?}",
                            self.name, sx, sy, gx, gy, elapsed
                        );
                    }
                }
            }
            ProfileGuard {
                name: #fn_name_str,
                start: std::time::Instant::now(),
                endpoints: (req.start.x, req.start.y, req.goal.x, req.goal.y),
            }
        }
    } else {
        quote! {
            struct ProfileGuard {
                name: &'static str,
                start: std::time::Instant,
            }
            impl Drop for ProfileGuard {
                fn drop(&mut self) {
                    let elapsed = self.start.elapsed();
                    if elapsed.as_millis() > #threshold_ms {
                        ::tracing::info!("[PERF] {}: {:?}", self.name, elapsed);
                    }
                }
            }
            ProfileGuard {
                name: #fn_name_str,
                start: std::time::Instant::now(),
            }
        }
    };

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #[cfg(feature = "perf_stats")]
            let _profile_timer = {
                #profile_guard_def
            };

            #block
        }
    };

    output.into()
}
