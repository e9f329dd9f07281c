/// Implements [Table](crate::database::Table) for a document type.
///
/// # Syntax
/// ```ignore
/// table!("table_name" : Model = id_field);
/// ```
/// Where `id_field` is a [Record](crate::database::Record) of the model.
///
/// # Example
///
/// ```ignore
/// table!("posts" : Post = id);
///
/// let key = post.id.key();
/// let table = Post::table();
/// ```
#[macro_export]
macro_rules! table {
    ($table:literal : $model:ty = $id:ident) => {
        impl $crate::database::Table for $model {
            fn id(&self) -> &$crate::database::Thing {
                self.$id.as_ref()
            }

            fn table() -> &'static str {
                $table
            }
        }
    };
}
